//! Strongly-typed identifiers for the reference data the engine consumes.
//!
//! Classes, subjects and teachers are owned by external record managers; the
//! engine only ever sees their ids. Wrapping each in its own newtype keeps a
//! `(class, subject, teacher)` triple from being assembled in the wrong order.

/// Defines a newtype wrapper around a `String` identifier and generates:
/// - derives (Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)
/// - transparent serde representation
/// - `Display`, `AsRef<str>`, `From<&str>` and `From<String>`
macro_rules! define_string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.len() == value.len() {
                    $name(value)
                } else {
                    $name(trimmed.to_string())
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name::new(value)
            }
        }
    };
}

define_string_id!(
    /// Identity of a teaching group, e.g. `"5"`.
    ClassId
);
define_string_id!(
    /// Identity of a curriculum subject, e.g. `"Math"`.
    SubjectId
);
define_string_id!(
    /// Identity of a staff member.
    TeacherId
);
define_string_id!(
    /// Label of an academic year, e.g. `"2025-2026"`. Every schedule document
    /// and faculty assignment is partitioned by it.
    AcademicYear
);
