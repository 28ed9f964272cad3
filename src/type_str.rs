use std::fmt;

/// Represents an Array Interface type-string of a numeric array element.
///
/// This is the dtype of an [`Array`][crate::Array].  Exposes a [`FromStr`][`core::str::FromStr`]
/// impl for construction from type strings (`"<f8"`) and a [`Display`][`core::fmt::Display`] impl
/// for writing them.  [`TypeStr::from_name`] and [`TypeStr::name`] convert from and to NumPy dtype
/// names (`"float64"`), which is what the JSON and INI backends store.
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// use guidata::TypeStr;
///
/// let ts = "<c16".parse::<TypeStr>()?;
///
/// assert_eq!(format!("{}", ts), "<c16");
/// assert_eq!(ts.name(), "complex128");
/// assert_eq!(ts.type_char(), guidata::TypeChar::Complex);
/// assert_eq!(TypeStr::from_name("complex128"), Some(ts));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeStr {
    pub(crate) endianness: Endianness,
    pub(crate) type_char: TypeChar,
    pub(crate) size: u64,
}

impl TypeStr {
    /// Extract the endianness character from the type string.
    pub fn endianness(&self) -> Endianness { self.endianness }

    /// Extract the type character from the type string.
    pub fn type_char(&self) -> TypeChar { self.type_char }

    /// Extract the "size" field from the type string.  This is the number of bytes of one element.
    pub fn size_field(&self) -> u64 { self.size }

    /// Get the number of bytes for a single value.
    pub fn num_bytes(&self) -> usize { self.size as usize }

    /// The same dtype with the given endianness.  1-byte types keep `|`.
    pub fn with_endianness(self, endianness: Endianness) -> Self {
        match self.type_char.requires_endianness(self.size) {
            true => TypeStr { endianness, ..self },
            false => self,
        }
    }

    /// Build a type string in little endian order (the byte order every backend writes).
    pub(crate) fn little(type_char: TypeChar, size: u64) -> Self {
        let endianness = match type_char.requires_endianness(size) {
            true => Endianness::Little,
            false => Endianness::Irrelevant,
        };
        TypeStr { endianness, type_char, size }
    }

    /// Look up a NumPy dtype name such as `"int32"` or `"complex128"`.
    pub fn from_name(name: &str) -> Option<Self> {
        let (type_char, size) = match name {
            "bool" => (TypeChar::Bool, 1),
            "int8" => (TypeChar::Int, 1),
            "int16" => (TypeChar::Int, 2),
            "int32" => (TypeChar::Int, 4),
            "int64" => (TypeChar::Int, 8),
            "uint8" => (TypeChar::Uint, 1),
            "uint16" => (TypeChar::Uint, 2),
            "uint32" => (TypeChar::Uint, 4),
            "uint64" => (TypeChar::Uint, 8),
            "float16" => (TypeChar::Float, 2),
            "float32" => (TypeChar::Float, 4),
            "float64" => (TypeChar::Float, 8),
            "complex64" => (TypeChar::Complex, 8),
            "complex128" => (TypeChar::Complex, 16),
            _ => return None,
        };
        Some(TypeStr::little(type_char, size))
    }

    /// Accepts either a NumPy dtype name or an array-interface type string.
    pub fn from_name_or_str(s: &str) -> Option<Self> {
        TypeStr::from_name(s).or_else(|| s.parse().ok())
    }

    /// The NumPy dtype name, e.g. `"float64"`.
    pub fn name(&self) -> &'static str {
        match (self.type_char, self.size) {
            (TypeChar::Bool, _) => "bool",
            (TypeChar::Int, 1) => "int8",
            (TypeChar::Int, 2) => "int16",
            (TypeChar::Int, 4) => "int32",
            (TypeChar::Int, _) => "int64",
            (TypeChar::Uint, 1) => "uint8",
            (TypeChar::Uint, 2) => "uint16",
            (TypeChar::Uint, 4) => "uint32",
            (TypeChar::Uint, _) => "uint64",
            (TypeChar::Float, 2) => "float16",
            (TypeChar::Float, 4) => "float32",
            (TypeChar::Float, _) => "float64",
            (TypeChar::Complex, 8) => "complex64",
            (TypeChar::Complex, _) => "complex128",
        }
    }

    /// Dtype of arrays created from Rust `f64` data.
    pub const FLOAT64: TypeStr = TypeStr { endianness: Endianness::Little, type_char: TypeChar::Float, size: 8 };
    /// Dtype of arrays created from Rust `i64` data.
    pub const INT64: TypeStr = TypeStr { endianness: Endianness::Little, type_char: TypeChar::Int, size: 8 };
    /// Dtype of arrays created from Rust `bool` data.
    pub const BOOL: TypeStr = TypeStr { endianness: Endianness::Irrelevant, type_char: TypeChar::Bool, size: 1 };
    /// Dtype of arrays created from `Complex<f64>` data.
    pub const COMPLEX128: TypeStr = TypeStr { endianness: Endianness::Little, type_char: TypeChar::Complex, size: 16 };
}

/// Represents the first character in a [`TypeStr`], which describes endianness.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Endianness {
    /// Code `<`.
    Little,
    /// Code `>`.
    Big,
    /// Code `|`. Used when endianness is irrelevant.
    ///
    /// Only valid when the size is `1`.
    Irrelevant,
}

impl Endianness {
    /// Parse the endianness character.
    pub fn from_char(s: char) -> Option<Self> {
        match s {
            '<' => Some(Endianness::Little),
            '>' => Some(Endianness::Big),
            '|' => Some(Endianness::Irrelevant),
            _ => None,
        }
    }

    /// Get the string representation of this endianness.
    pub fn to_str(self) -> &'static str {
        match self {
            Endianness::Little => "<",
            Endianness::Big => ">",
            Endianness::Irrelevant => "|",
        }
    }
}

/// Represents the second character in a [`TypeStr`].
///
/// Only the numeric kinds that an [`Array`][crate::Array] can hold are represented.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TypeChar {
    /// Code `b`.
    ///
    /// `size` must be 1, and legal values are `0x00` (`false`) or `0x01` (`true`).
    Bool,
    /// Code `i`.
    Int,
    /// Code `u`.
    Uint,
    /// Code `f`.
    ///
    /// Half precision values are converted through the [`half`] crate.
    Float,
    /// Code `c`. Represents a complex number.
    ///
    /// The real part followed by the imaginary part, with `size` bytes total between the two of
    /// them.
    Complex,
}

impl TypeChar {
    /// Parse a character into a datatype.
    pub fn from_char(s: char) -> Option<Self> {
        match s {
            'b' => Some(TypeChar::Bool),
            'i' => Some(TypeChar::Int),
            'u' => Some(TypeChar::Uint),
            'f' => Some(TypeChar::Float),
            'c' => Some(TypeChar::Complex),
            _ => None,
        }
    }

    /// Get the string representation of this datatype.  e.g. `"i"`.
    pub fn to_str(self) -> &'static str {
        match self {
            TypeChar::Bool => "b",
            TypeChar::Int => "i",
            TypeChar::Uint => "u",
            TypeChar::Float => "f",
            TypeChar::Complex => "c",
        }
    }

    fn valid_sizes(self) -> &'static [u64] {
        match self {
            TypeChar::Bool => &[1],
            TypeChar::Int |
            TypeChar::Uint => &[1, 2, 4, 8],
            TypeChar::Float => &[2, 4, 8],
            TypeChar::Complex => &[8, 16],
        }
    }

    /// Returns `true` if `|` endianness is illegal.
    fn requires_endianness(self, size: u64) -> bool {
        size != 1
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self.to_str(), f)
    }
}

impl fmt::Display for TypeChar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self.to_str(), f)
    }
}

impl fmt::Display for TypeStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{}", self.endianness, self.type_char, self.size)
    }
}

pub use self::parse::ParseTypeStrError;
mod parse {
    use super::*;

    /// Error type returned by `<TypeStr as FromStr>::parse`.
    #[derive(Debug, Clone)]
    pub struct ParseTypeStrError(ErrorKind);

    #[derive(Debug, Clone)]
    enum ErrorKind {
        SyntaxError,
        ParseIntError(std::num::ParseIntError),
        InvalidEndianness(TypeStr),
        InvalidSize(TypeStr),
    }

    impl fmt::Display for ParseTypeStrError {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            use self::ErrorKind::*;

            match &self.0 {
                SyntaxError => write!(f, "Invalid type-string"),
                InvalidEndianness(ty) => write!(f, "Type string '{}' has invalid endianness", ty),
                InvalidSize(ty) => {
                    write!(f, "Type string '{}' has invalid size.", ty)?;
                    write!(f, " Valid sizes are: {:?}", ty.type_char.valid_sizes())
                },
                ParseIntError(e) => write!(f, "{}", e),
            }
        }
    }

    macro_rules! bail {
        ($variant:expr) => {
            return Err(ParseTypeStrError($variant))
        };
    }

    impl std::error::Error for ParseTypeStrError {}

    impl std::str::FromStr for TypeStr {
        type Err = ParseTypeStrError;

        fn from_str(input: &str) -> Result<Self, ParseTypeStrError> {
            use self::ErrorKind::*;

            let mut chars = input.chars();

            let endianness = match chars.next().and_then(Endianness::from_char) {
                None => bail!(SyntaxError),
                Some(v) => v,
            };

            let type_char = match chars.next().and_then(TypeChar::from_char) {
                None => bail!(SyntaxError),
                Some(v) => v,
            };

            let remainder = chars.as_str();
            if remainder.is_empty() || !remainder.bytes().all(|b| b.is_ascii_digit()) {
                bail!(SyntaxError);
            }
            let size = match remainder.parse() {
                Err(e) => bail!(ParseIntError(e)), // probably overflow
                Ok(v) => v,
            };

            TypeStr { endianness, type_char, size }.validate()
        }
    }

    impl TypeStr {
        pub(crate) fn validate(self) -> Result<Self, ParseTypeStrError> {
            use self::ErrorKind::*;

            let TypeStr { endianness, type_char, size } = self;

            if type_char.requires_endianness(size) && endianness == Endianness::Irrelevant {
                bail!(InvalidEndianness(self));
            }

            if !type_char.valid_sizes().contains(&size) {
                bail!(InvalidSize(self));
            }

            Ok(self)
        }
    }

    #[cfg(test)]
    #[deny(unused)]
    mod tests {
        use super::*;

        macro_rules! assert_matches {
            ($expr:expr, $pat:pat) => {
                match $expr {
                    $pat => {},
                    actual => panic!("Expected: {}\nGot: {:?}", stringify!($pat), actual),
                }
            };
        }

        macro_rules! check_ok {
            ($s:expr) => {
                assert_matches!($s.parse::<TypeStr>(), Ok(_));
            };
        }
        macro_rules! check_err {
            ($s:expr, $p:pat) => {
                assert_matches!($s.parse::<TypeStr>(), Err(ParseTypeStrError($p)));
            };
        }

        #[test]
        fn errors() {
            use self::ErrorKind::*;

            check_err!("", SyntaxError);
            check_err!(">", SyntaxError);
            check_err!(">i", SyntaxError);
            check_ok!(">i8");
            check_ok!(">c16");
            check_err!(">i8garbage", SyntaxError);

            // make sure integer overflow doesn't panic
            check_err!(">i999999999999999999999999999999", _);

            // Unrecognized specifiers
            check_err!("*i8", SyntaxError);
            check_err!("<p8", SyntaxError);
            check_err!("|S7", SyntaxError);
            check_err!("<m8[us]", SyntaxError);

            // Required endianness
            check_ok!("|i1");
            check_ok!("|b1");
            check_err!("|i8", InvalidEndianness { .. });

            // Size
            check_err!(">i9", InvalidSize { .. });
            check_err!(">b4", InvalidSize { .. });
            check_err!("<f16", InvalidSize { .. });
            check_err!("<c4", InvalidSize { .. });
        }
    }
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    use super::*;

    #[test]
    fn display_simple() {
        assert_eq!(
            TypeStr { endianness: Endianness::Little, type_char: TypeChar::Int, size: 8 }.to_string(),
            "<i8",
        );
        assert_eq!(TypeStr::BOOL.to_string(), "|b1");
    }

    #[test]
    fn names_roundtrip() {
        for name in [
            "bool", "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64",
            "float16", "float32", "float64", "complex64", "complex128",
        ] {
            let ts = TypeStr::from_name(name).unwrap_or_else(|| panic!("unknown name {}", name));
            assert_eq!(ts.name(), name);
        }
        assert_eq!(TypeStr::from_name("object"), None);
        assert_eq!(TypeStr::from_name_or_str(">f4").map(|t| t.name()), Some("float32"));
    }

    #[test]
    fn one_byte_types_ignore_endianness() {
        assert_eq!(TypeStr::from_name("uint8").map(|t| t.to_string()), Some("|u1".to_string()));
        assert_eq!(TypeStr::BOOL.with_endianness(Endianness::Big), TypeStr::BOOL);
        assert_eq!(TypeStr::FLOAT64.with_endianness(Endianness::Big).to_string(), ">f8");
    }
}
