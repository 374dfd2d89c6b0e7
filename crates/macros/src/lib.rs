/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemEnum, ItemFn};

/// Wraps a function and logs its wall-clock duration at `debug` level under the
/// `[DURATION]` tag. Visibility and asyncness of the original function are kept.
///
/// `tracing::debug` must be in scope at the call site.
#[proc_macro_attribute]
pub fn measure_duration(_: TokenStream, input: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(input as ItemFn);
    let attrs = &input_fn.attrs;
    let visibility = &input_fn.vis;
    let signature = &input_fn.sig;
    let function_body = &input_fn.block;
    let fn_name = &input_fn.sig.ident;

    let body = match signature.asyncness {
        Some(_) => quote! { async move #function_body.await },
        None => quote! { (move || #function_body)() },
    };

    let expanded = quote! {
        #(#attrs)*
        #visibility #signature {
            let start_time = std::time::Instant::now();
            let result = #body;
            debug!(
                tag = "[DURATION]",
                function = stringify!(#fn_name),
                duration_ms = start_time.elapsed().as_millis() as u64
            );
            result
        }
    };

    TokenStream::from(expanded)
}

/// Turns a plain enum into an error type: derives `Debug`, `Serialize` and
/// `thiserror::Error`, giving every variant a SCREAMING_SNAKE_CASE display string.
///
/// `serde::Serialize` must be in scope at the call site.
#[proc_macro_attribute]
pub fn add_error(_: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as ItemEnum);
    let enum_name = &input.ident;
    let visibility = &input.vis;

    let variants = input.variants.iter().map(|variant| {
        let variant_name = &variant.ident;
        let variant_screaming_snake_case = convert_to_snake_case(variant_name.to_string());
        quote! {
            #[error(#variant_screaming_snake_case)]
            #variant,
        }
    });

    let expanded = quote! {
        #[derive(Debug, Serialize, thiserror::Error)]
        #visibility enum #enum_name {
            #(#variants)*
        }
    };

    TokenStream::from(expanded)
}

fn convert_to_snake_case(input: String) -> String {
    let mut result = String::new();
    let mut last_char_was_upper = false;

    for c in input.chars() {
        if c.is_uppercase() {
            if !last_char_was_upper && !result.is_empty() {
                result.push('_');
            }
            result.push(c.to_ascii_uppercase());
            last_char_was_upper = true;
        } else {
            result.push(c.to_ascii_uppercase());
            last_char_was_upper = false;
        }
    }

    result
}
