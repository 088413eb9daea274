use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn};

/// Test attribute used across aiorx.
///
/// Sync functions become a plain `#[test]`. Async functions run on a fresh
/// `futures::executor::LocalPool`; if the function takes one argument it is
/// bound to a `Scheduler` built from the pool's spawner. After the body
/// finishes the pool is run until stalled so background tasks settle.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);

  let raw_args = proc_macro2::TokenStream::from(attr);
  if !raw_args.is_empty() {
    return TokenStream::from(
      syn::Error::new(raw_args.span(), "aiorx_macro::test does not take arguments")
        .to_compile_error(),
    );
  }

  if input.sig.asyncness.is_none() {
    if !input.sig.inputs.is_empty() {
      return TokenStream::from(
        syn::Error::new(
          input.sig.inputs.span(),
          "only async aiorx tests can receive a scheduler argument",
        )
        .to_compile_error(),
      );
    }
    return TokenStream::from(quote! {
      #[test]
      #input
    });
  }

  let ItemFn { attrs, vis, sig, block } = input;
  let name = &sig.ident;
  let output = &sig.output;

  let binding = match sig.inputs.len() {
    0 => proc_macro2::TokenStream::new(),
    1 => match sig.inputs.first() {
      Some(FnArg::Typed(arg)) => {
        let pat = &arg.pat;
        let ty = &arg.ty;
        quote!(let #pat: #ty = ::core::convert::From::from(__pool.spawner());)
      }
      _ => {
        return TokenStream::from(
          syn::Error::new(sig.inputs.span(), "unexpected receiver in aiorx test")
            .to_compile_error(),
        );
      }
    },
    _ => {
      return TokenStream::from(
        syn::Error::new(sig.inputs.span(), "aiorx tests take at most one argument (the scheduler)")
          .to_compile_error(),
      );
    }
  };

  let expanded = quote! {
    #[test]
    #(#attrs)*
    #vis fn #name() #output {
      let mut __pool = ::futures::executor::LocalPool::new();
      #binding
      let __out = __pool.run_until(async move #block);
      __pool.run_until_stalled();
      __out
    }
  };

  TokenStream::from(expanded)
}
