//! Macros for declaring state identifier enums.

/// Generate a field-less state enum and its `StateId` implementation.
///
/// Variants are named after their identifier unless a string label is
/// given with `Variant = "label"`.
///
/// # Example
///
/// ```
/// use fsm_rx::core::StateId;
/// use fsm_rx::state_enum;
///
/// state_enum! {
///     pub enum TrafficLight {
///         Go = "go",
///         PrepareToStop = "prepareToStop",
///         Stop,
///     }
/// }
///
/// assert_eq!(TrafficLight::PrepareToStop.name(), "prepareToStop");
/// assert_eq!(TrafficLight::Stop.name(), "Stop");
/// assert_eq!(TrafficLight::all().len(), 3);
/// ```
#[macro_export]
macro_rules! state_enum {
    (@name $variant:ident $label:literal) => {
        $label
    };
    (@name $variant:ident) => {
        stringify!($variant)
    };
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $(= $label:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Debug,
            serde::Serialize,
            serde::Deserialize
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $(#[serde(rename = $label)])?
                $variant
            ),*
        }

        impl $crate::core::StateId for $name {
            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $crate::state_enum!(@name $variant $($label)?)),*
                }
            }

            fn all() -> &'static [Self] {
                &[$(Self::$variant),*]
            }
        }
    };
}
