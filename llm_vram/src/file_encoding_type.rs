//! llama.cpp file types (`enum llama_ftype`) with the ggml block layout each one stores weights
//! in, and resolution of the labels metadata parsers and file names use for them.

#[derive(Debug, thiserror::Error, PartialEq, serde::Serialize)]
pub enum GgmlFileTypeError {
    #[error("unknown llama.cpp file type value {0}")]
    UnknownValue(u32),

    #[error("no quantization label recognised in `{0}`")]
    UnknownLabel(String),
}

/// One ggml block: `bytes` of storage holding `weights` quantized values and their scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub bytes: u16,
    pub weights: u16,
}

impl BlockLayout {
    pub fn bits_per_weight(self) -> f64 {
        f64::from(self.bytes) * 8.0 / f64::from(self.weights)
    }
}

macro_rules! file_types {
    ($(
        $variant:ident = $value:literal {
            tag: $tag:literal,
            bits: $level:literal,
            block: ($bytes:literal, $weights:literal)
        }
    ),+ $(,)?) => {
        /// `llama_ftype` without the `LLAMA_FTYPE_MOSTLY_` prefix; discriminants match `llama.h`.
        #[repr(u16)]
        #[allow(non_camel_case_types)]
        ///
        /// Serialized as its tag; deserializes from any tag spelling [`TryFrom<&str>`] accepts.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        #[non_exhaustive]
        pub enum GgmlFileType {
            $( $variant = $value ),+
        }

        impl GgmlFileType {
            /// Every known file type, in `llama.h` order.
            pub const ALL: &'static [GgmlFileType] = &[ $( GgmlFileType::$variant ),+ ];

            #[inline]
            pub const fn value(self) -> u16 {
                self as u16
            }

            /// Tag as it appears in file names, e.g. `"Q4_K_M"`.
            #[inline]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $tag ),+
                }
            }

            /// Nominal bits of a quantized value, without block scales.
            #[inline]
            pub const fn level(self) -> u8 {
                match self {
                    $( Self::$variant => $level ),+
                }
            }

            #[inline]
            pub const fn block(self) -> BlockLayout {
                match self {
                    $( Self::$variant => BlockLayout { bytes: $bytes, weights: $weights } ),+
                }
            }
        }
    };
}

file_types! {
    AllF32  =  0 { tag: "F32",     bits: 32, block: (  4,   1) },
    F16     =  1 { tag: "F16",     bits: 16, block: (  2,   1) },
    Q4_0    =  2 { tag: "Q4_0",    bits:  4, block: ( 18,  32) },
    Q4_1    =  3 { tag: "Q4_1",    bits:  4, block: ( 20,  32) },
    Q8_0    =  7 { tag: "Q8_0",    bits:  8, block: ( 34,  32) },
    Q5_0    =  8 { tag: "Q5_0",    bits:  5, block: ( 22,  32) },
    Q5_1    =  9 { tag: "Q5_1",    bits:  5, block: ( 24,  32) },
    Q2_K    = 10 { tag: "Q2_K",    bits:  2, block: ( 84, 256) },
    Q3_K_S  = 11 { tag: "Q3_K_S",  bits:  3, block: (110, 256) },
    Q3_K_M  = 12 { tag: "Q3_K_M",  bits:  3, block: (110, 256) },
    Q3_K_L  = 13 { tag: "Q3_K_L",  bits:  3, block: (110, 256) },
    Q4_K_S  = 14 { tag: "Q4_K_S",  bits:  4, block: (144, 256) },
    Q4_K_M  = 15 { tag: "Q4_K_M",  bits:  4, block: (144, 256) },
    Q5_K_S  = 16 { tag: "Q5_K_S",  bits:  5, block: (176, 256) },
    Q5_K_M  = 17 { tag: "Q5_K_M",  bits:  5, block: (176, 256) },
    Q6_K    = 18 { tag: "Q6_K",    bits:  6, block: (210, 256) },
    IQ2_XXS = 19 { tag: "IQ2_XXS", bits:  2, block: ( 66, 256) },
    IQ2_XS  = 20 { tag: "IQ2_XS",  bits:  2, block: ( 74, 256) },
    Q2_K_S  = 21 { tag: "Q2_K_S",  bits:  2, block: ( 84, 256) },
    IQ3_XS  = 22 { tag: "IQ3_XS",  bits:  3, block: (110, 256) },
    IQ3_XXS = 23 { tag: "IQ3_XXS", bits:  3, block: ( 98, 256) },
    IQ1_S   = 24 { tag: "IQ1_S",   bits:  1, block: ( 50, 256) },
    IQ4_NL  = 25 { tag: "IQ4_NL",  bits:  4, block: ( 18,  32) },
    IQ3_S   = 26 { tag: "IQ3_S",   bits:  3, block: (110, 256) },
    IQ3_M   = 27 { tag: "IQ3_M",   bits:  3, block: (110, 256) },
    IQ2_S   = 28 { tag: "IQ2_S",   bits:  2, block: ( 82, 256) },
    IQ2_M   = 29 { tag: "IQ2_M",   bits:  2, block: ( 82, 256) },
    IQ4_XS  = 30 { tag: "IQ4_XS",  bits:  4, block: (136, 256) },
    IQ1_M   = 31 { tag: "IQ1_M",   bits:  1, block: ( 56, 256) },
    BF16    = 32 { tag: "BF16",    bits: 16, block: (  2,   1) },
}

/// The formats the memory model estimates, highest fidelity first.
///
/// One 16-bit float format and one representative integer format per bit level. Every other
/// variant is recognised when parsing labels but is not estimated.
pub const ESTIMATION_FORMATS: &[GgmlFileType] = &[
    GgmlFileType::F16,
    GgmlFileType::Q8_0,
    GgmlFileType::Q6_K,
    GgmlFileType::Q5_K_M,
    GgmlFileType::Q4_K_M,
    GgmlFileType::Q3_K_M,
    GgmlFileType::Q2_K,
];

static LEVEL_LABEL: std::sync::OnceLock<Option<regex::Regex>> = std::sync::OnceLock::new();

impl GgmlFileType {
    /// Maps llama.cpp's numeric `general.file_type`.
    pub fn from_file_type_value<I: Into<u32>>(value: I) -> Result<Self, GgmlFileTypeError> {
        let value = value.into();
        Self::ALL
            .iter()
            .copied()
            .find(|ft| u32::from(ft.value()) == value)
            .ok_or(GgmlFileTypeError::UnknownValue(value))
    }

    /// Storage cost including block scales, e.g. `4.5` for `Q4_K_M`.
    #[inline]
    pub fn bits_per_weight(self) -> f64 {
        self.block().bits_per_weight()
    }

    #[inline]
    pub fn nominal_bits_per_weight(self) -> f64 {
        f64::from(self.level())
    }

    #[inline]
    pub fn is_estimated(self) -> bool {
        ESTIMATION_FORMATS.contains(&self)
    }

    /// The estimated format at a bit level, e.g. `4` → `Q4_K_M`.
    pub fn for_level(level: u8) -> Option<Self> {
        ESTIMATION_FORMATS
            .iter()
            .copied()
            .find(|ft| ft.level() == level)
    }

    /// Resolves a tag, anywhere in a file name (`"model-q4_k_m.gguf"`), or a bit-level label
    /// (`"4-bit"`, `"4bit"`, `"q4"`, `"16"`).
    pub fn parse_label(label: &str) -> Result<Self, GgmlFileTypeError> {
        Self::find_tag(label)
            .or_else(|| Self::parse_level(label).and_then(Self::for_level))
            .ok_or_else(|| GgmlFileTypeError::UnknownLabel(label.to_string()))
    }

    /// The longest tag whose `_`-separated parts appear consecutively among the label's
    /// alphanumeric runs. Case and delimiters are ignored.
    fn find_tag(label: &str) -> Option<Self> {
        let words: Vec<String> = label
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_ascii_uppercase)
            .collect();

        Self::ALL
            .iter()
            .copied()
            .filter(|ft| {
                let parts: Vec<&str> = ft.as_str().split('_').collect();
                words
                    .windows(parts.len())
                    .any(|window| window.iter().zip(&parts).all(|(w, p)| w == p))
            })
            .max_by_key(|ft| ft.as_str().len())
    }

    fn parse_level(label: &str) -> Option<u8> {
        let re = LEVEL_LABEL
            .get_or_init(|| regex::Regex::new(r"(?i)^\s*q?(\d{1,2})\s*(?:-?\s*bits?)?\s*$").ok())
            .as_ref()?;
        re.captures(label)?.get(1)?.as_str().parse().ok()
    }
}

impl TryFrom<&str> for GgmlFileType {
    type Error = GgmlFileTypeError;

    /// Tags only: `"Q4_K_M"`, `"q4-k-m"`, or a file name containing one.
    fn try_from(tag: &str) -> Result<Self, Self::Error> {
        Self::find_tag(tag).ok_or_else(|| GgmlFileTypeError::UnknownLabel(tag.to_string()))
    }
}

impl TryFrom<String> for GgmlFileType {
    type Error = GgmlFileTypeError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        Self::try_from(tag.as_str())
    }
}

impl From<GgmlFileType> for &'static str {
    fn from(ft: GgmlFileType) -> Self {
        ft.as_str()
    }
}

impl std::str::FromStr for GgmlFileType {
    type Err = GgmlFileTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_label(s)
    }
}

impl core::fmt::Display for GgmlFileType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({}-bit)", self.as_str(), self.level())
    }
}
