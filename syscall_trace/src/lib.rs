use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemFn, parse_macro_input};

/// Arguments that are never printed: the trap frame and the calling task.
const HIDDEN_ARGS: &[&str] = &["tf", "curr"];

/// User pointer wrappers. They are printed by address, never dereferenced.
const USER_PTR_TYPES: &[&str] = &["UserInPtr", "UserOutPtr"];

/// Log a syscall's arguments on entry and its result on exit, at debug level.
///
/// The function must return a `Result` whose both sides implement `Debug`.
/// Plain arguments must implement `Display`.
#[proc_macro_attribute]
pub fn syscall_trace(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut function = parse_macro_input!(item as ItemFn);
    let signature = &function.sig;
    let fn_name = &signature.ident;
    let fn_args: Vec<_> = signature
        .inputs
        .iter()
        .filter_map(|arg| {
            // only named arguments; skip `self` and destructuring patterns
            match arg {
                syn::FnArg::Typed(pat_type) => {
                    let arg_name = match &*pat_type.pat {
                        syn::Pat::Ident(pat_ident) => &pat_ident.ident,
                        _ => return None,
                    };
                    if HIDDEN_ARGS.iter().any(|hidden| arg_name == hidden) {
                        return None;
                    }
                    Some((arg_name, &pat_type.ty))
                }
                _ => None,
            }
        })
        .collect();

    let arg_patterns: Vec<_> = fn_args
        .iter()
        .map(|(arg_name, arg_type)| match &***arg_type {
            syn::Type::Path(type_path) => {
                let is_user_ptr = type_path
                    .path
                    .segments
                    .last()
                    .is_some_and(|segment| USER_PTR_TYPES.iter().any(|ty| segment.ident == ty));
                if is_user_ptr {
                    quote! { #arg_name.fmt_trace() }
                } else {
                    quote! { #arg_name }
                }
            }
            _ => quote! { #arg_name },
        })
        .collect();

    let arg_list_pattern = fn_args
        .iter()
        .map(|(name, _)| format!("{} = {{}}", name))
        .collect::<Vec<_>>()
        .join(", ");
    let format_pattern_in = format!("[syscall] <= {}({})", fn_name, arg_list_pattern);
    let format_pattern_out = format!("[syscall] => {}({}) = {{:?}}", fn_name, arg_list_pattern);

    let fn_body = &function.block;
    function.block = syn::parse2(quote! {{
        debug!(#format_pattern_in #(, #arg_patterns)*);

        let __result = (|| #fn_body)();

        match __result {
            Ok(ref value) => debug!(#format_pattern_out #(, #arg_patterns)*, value),
            Err(ref error) => debug!(#format_pattern_out #(, #arg_patterns)*, error),
        }
        __result
    }})
    .expect("syscall_trace: failed to rebuild function body");
    quote! {
        #function
    }
    .into()
}
