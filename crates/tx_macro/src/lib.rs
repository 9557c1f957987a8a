extern crate proc_macro;

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, FnArg, ItemFn, PatType, Receiver};

/// Runs the annotated async method inside a MongoDB transaction.
///
/// The method must take a `session: &mut Session` argument and return a
/// `Result` whose error type converts from `mongodb::error::Error`. The
/// transaction commits on `Ok` and aborts on `Err`; when the abort itself
/// fails it is logged and the body's error is returned unchanged, so the
/// causal error never gets masked.
#[proc_macro_attribute]
pub fn tx(_args: TokenStream, input: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(input as ItemFn);
    let vis = &input_fn.vis;
    let block = &input_fn.block;
    let fn_name = &input_fn.sig.ident;
    let fn_args = &input_fn.sig.inputs;
    let fn_return = &input_fn.sig.output;

    let forwarded: Vec<_> = fn_args
        .iter()
        .map(|arg| match arg {
            FnArg::Typed(PatType { pat, .. }) => quote! { #pat },
            FnArg::Receiver(Receiver { .. }) => quote! { self },
        })
        .collect();

    let body_fn = format_ident!("{}_in_tx", fn_name);
    let gen = quote! {
        async fn #body_fn(#fn_args) #fn_return {
            #block
        }

        #vis async fn #fn_name(#fn_args) #fn_return {
            session.start_transaction().await?;
            match Self::#body_fn(#(#forwarded),*).await {
                Ok(value) => {
                    session.commit_transaction().await?;
                    Ok(value)
                }
                Err(err) => {
                    if let Err(abort_err) = session.abort_transaction().await {
                        log::error!("Failed to abort transaction: {}", abort_err);
                    }
                    Err(err)
                }
            }
        }
    };

    TokenStream::from(gen)
}
