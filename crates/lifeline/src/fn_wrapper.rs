// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Generates a clonable wrapper around a user-provided `Fn`.
///
/// The generated type stores the function in an `Arc<dyn Fn ... + Send + Sync>` and provides
/// `new`, `call`, `Clone` and `Debug`.
///
/// ```rust,ignore
/// define_fn_wrapper!(EventListener(Fn(event: &ResilienceEvent)));
/// ```
macro_rules! define_fn_wrapper {
    ($(#[$meta:meta])* $vis:vis $name:ident(Fn($($param_name:ident: $param_ty:ty),*) -> $return_ty:ty)) => {
        $(#[$meta])*
        $vis struct $name(std::sync::Arc<dyn Fn($($param_ty),*) -> $return_ty + Send + Sync>);

        impl $name {
            /// Wraps the given function.
            $vis fn new<F>(function: F) -> Self
            where
                F: Fn($($param_ty),*) -> $return_ty + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(function))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) -> $return_ty {
                (self.0)($($param_name),*)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish()
            }
        }
    };

    ($(#[$meta:meta])* $vis:vis $name:ident(Fn($($param_name:ident: $param_ty:ty),*))) => {
        $crate::fn_wrapper::define_fn_wrapper!($(#[$meta])* $vis $name(Fn($($param_name: $param_ty),*) -> ()));
    };
}

pub(crate) use define_fn_wrapper;
