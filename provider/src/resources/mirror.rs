/// Declares an attribute block whose fields map one to one onto a wire struct made of `Option`s,
/// together with the conversions in both directions. Fields named in `secrets` are write only on
/// the server, `keep_secrets` copies them over from the prior state after a read.
macro_rules! mirrored_block {
    (
        $(#[$attr:meta])*
        pub struct $state:ident => $wire:path {
            $($field:ident: $ty:ty),* $(,)?
        }
        secrets [$($secret:ident),* $(,)?]
    ) => {
        $(#[$attr])*
        #[derive(
            Debug,
            Default,
            Clone,
            PartialEq,
            Eq,
            serde::Serialize,
            serde::Deserialize,
            schemars::JsonSchema,
        )]
        pub struct $state {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl From<&$wire> for $state {
            fn from(wire: &$wire) -> Self {
                Self {
                    $($field: wire.$field.clone(),)*
                }
            }
        }

        impl From<&$state> for $wire {
            fn from(state: &$state) -> Self {
                Self {
                    $($field: state.$field.clone(),)*
                }
            }
        }

        impl $state {
            #[allow(unused_mut, unused_variables)]
            pub(crate) fn keep_secrets(mut self, prior: Option<&Self>) -> Self {
                if let Some(prior) = prior {
                    $(
                        if self.$secret.is_none() {
                            self.$secret = prior.$secret.clone();
                        }
                    )*
                }
                self
            }
        }
    };
}

