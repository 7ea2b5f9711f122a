//! Procedural macros for on-device testing of aqi-monitor-esp32.
//!
//! Provides `#[tap_test]`, which registers a function with the TAP harness in
//! `aqi_monitor_esp32::testing` so the `device-tests` binary can run it on the
//! board (or on the host) without the libtest harness.

use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, Parser};
use syn::{parse_macro_input, Expr, ExprLit, ItemFn, Lit, Meta, ReturnType};

/// Register a function as a TAP test.
///
/// The function either returns nothing (a panic is a failure) or returns a
/// `Result` (an `Err` is a failure).
///
/// ```ignore
/// use aqi_monitor_esp32_macros::tap_test;
///
/// #[tap_test]
/// fn empty_ssid_is_rejected() {
///     assert!(Credentials::new("", "secret123").is_err());
/// }
///
/// #[tap_test(should_panic = "attempt to divide by zero")]
/// fn division_panics() {
///     let _ = 1 / std::hint::black_box(0);
/// }
/// ```
#[proc_macro_attribute]
pub fn tap_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(item as ItemFn);

    let expectation = match Expectation::parse(attr) {
        Ok(e) => e,
        Err(e) => return e.to_compile_error().into(),
    };

    let fn_name = &input_fn.sig.ident;
    let fn_name_str = fn_name.to_string();
    let returns_result = matches!(input_fn.sig.output, ReturnType::Type(_, _));

    let register_call = match expectation {
        Expectation::Pass if returns_result => quote! {
            runner.run(#fn_name_str, #fn_name);
        },
        Expectation::Pass => quote! {
            runner.run_assert(#fn_name_str, #fn_name);
        },
        Expectation::Panic(None) => quote! {
            runner.run_should_panic(#fn_name_str, #fn_name, None);
        },
        Expectation::Panic(Some(msg)) => quote! {
            runner.run_should_panic(#fn_name_str, #fn_name, Some(#msg));
        },
    };

    let expanded = quote! {
        #input_fn

        ::aqi_monitor_esp32::testing::inventory::submit! {
            ::aqi_monitor_esp32::testing::TapTestEntry::new(
                #fn_name_str,
                |runner: &mut ::aqi_monitor_esp32::testing::TestRunner| {
                    #register_call
                }
            )
        }
    };

    TokenStream::from(expanded)
}

enum Expectation {
    Pass,
    Panic(Option<String>),
}

impl Expectation {
    fn parse(attr: TokenStream) -> syn::Result<Self> {
        if attr.is_empty() {
            return Ok(Self::Pass);
        }

        let meta = Meta::parse.parse(attr)?;
        match meta {
            Meta::Path(p) if p.is_ident("should_panic") => Ok(Self::Panic(None)),
            Meta::NameValue(nv) if nv.path.is_ident("should_panic") => match nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Ok(Self::Panic(Some(s.value()))),
                other => Err(syn::Error::new_spanned(
                    other,
                    "tap_test: should_panic expects a string literal",
                )),
            },
            other => Err(syn::Error::new_spanned(
                other,
                "tap_test: supported forms are #[tap_test], #[tap_test(should_panic)] \
                 and #[tap_test(should_panic = \"message\")]",
            )),
        }
    }
}
