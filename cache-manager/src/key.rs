use shared::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Structural stand-in for the type of a cached item, used only to namespace keys.
///
/// A plain type is just a name. A parameterized type carries its arguments, which are
/// descriptors themselves, so `HashMap<String, Vec<User>>` is described as
/// `generic("HashMap", [new("String"), generic("Vec", [new("User")])])`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    name: String,
    arguments: Vec<TypeDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, arguments: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into_iter().collect(),
        }
    }

    pub fn with_argument(mut self, argument: TypeDescriptor) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[TypeDescriptor] {
        &self.arguments
    }

    /// `Name` for plain types, `Name<Arg1|Arg2|...>` for parameterized ones, recursively
    pub fn signature(&self) -> String {
        let mut out = String::new();
        self.write_signature(&mut out);
        out
    }

    fn write_signature(&self, out: &mut String) {
        out.push_str(&self.name);
        if self.arguments.is_empty() {
            return;
        }
        out.push('<');
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                out.push('|');
            }
            argument.write_signature(out);
        }
        out.push('>');
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Types that know their own descriptor
pub trait Describe {
    fn descriptor() -> TypeDescriptor;
}

macro_rules! describe_plain {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::new($name)
                }
            }
        )*
    };
}

describe_plain! {
    String => "String",
    str => "String",
    bool => "bool",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    f32 => "f32",
    f64 => "f64",
}

impl<T: Describe> Describe for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("Vec", [T::descriptor()])
    }
}

impl<T: Describe> Describe for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("Option", [T::descriptor()])
    }
}

impl<T: Describe, S> Describe for HashSet<T, S> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("HashSet", [T::descriptor()])
    }
}

impl<K: Describe, V: Describe, S> Describe for HashMap<K, V, S> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("HashMap", [K::descriptor(), V::descriptor()])
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("BTreeMap", [K::descriptor(), V::descriptor()])
    }
}

/// A store key derived from an item type and a caller-supplied fragment.
///
/// Invalid keys keep the raw fragment as their string value and are rejected by every
/// coordinator operation before the store is touched.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DerivedKey {
    key: String,
    valid: bool,
}

impl DerivedKey {
    /// Derive a key for `T` using its [`Describe`] descriptor
    pub fn of<T: Describe + ?Sized>(fragment: Option<&str>) -> Self {
        KeyBuilder::build(&T::descriptor(), fragment)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn ensure_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::InvalidKey("Provided cache key is invalid.".to_string()))
        }
    }
}

impl fmt::Display for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

pub struct KeyBuilder;

impl KeyBuilder {
    /// A fragment is usable when present and not blank; an absent one maps to an empty key
    pub fn build(descriptor: &TypeDescriptor, fragment: Option<&str>) -> DerivedKey {
        match fragment {
            Some(raw) if !raw.trim().is_empty() => DerivedKey {
                key: format!("{}-{}", descriptor.signature(), raw),
                valid: true,
            },
            raw => DerivedKey {
                key: raw.unwrap_or_default().to_string(),
                valid: false,
            },
        }
    }
}
