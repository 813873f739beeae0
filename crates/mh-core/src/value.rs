use serde::{Deserialize, Serialize};

use crate::types::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    None,
    Int,
    Float,
    String,
    Color,
}

impl ValueKind {
    /// Resolves a declared type identifier (`int`, `float`, `string`, `color`).
    pub fn from_identifier(identifier: &str) -> Self {
        if identifier.eq_ignore_ascii_case("int") {
            Self::Int
        } else if identifier.eq_ignore_ascii_case("float") {
            Self::Float
        } else if identifier.eq_ignore_ascii_case("string") {
            Self::String
        } else if identifier.eq_ignore_ascii_case("color") {
            Self::Color
        } else {
            Self::None
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Color => "color",
        }
    }

    /// Types a bare literal by how much of it parses as a number.
    ///
    /// Empty text is a string. Text that parses entirely as a float but not
    /// entirely as an integer is a float. Text that parses entirely as an
    /// integer without overflow is an int. Hexadecimal notation is never
    /// treated as numeric.
    pub fn sniff(text: &str) -> Self {
        if text.is_empty() {
            return Self::String;
        }

        let bytes = text.as_bytes();
        let hex = bytes.len() > 1 && bytes[1].eq_ignore_ascii_case(&b'x');

        let int_end = integer_prefix_len(text);
        let float_end = if hex { 0 } else { float_prefix_len(text) };

        if float_end > int_end && float_end == text.len() {
            return Self::Float;
        }
        if int_end == text.len() && parse_int_lenient_checked(text).is_some() {
            return Self::Int;
        }
        Self::String
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scans three whitespace separated integers. Components outside the
    /// byte range are truncated rather than rejected.
    pub fn scan(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let mut channels = [0i64; 3];
        for channel in &mut channels {
            let part = parts.next()?;
            let end = integer_prefix_len(part);
            if end == 0 {
                return None;
            }
            *channel = part[..end].trim().parse::<i64>().ok()?;
        }
        Some(Self {
            r: channels[0] as u8,
            g: channels[1] as u8,
            b: channels[2] as u8,
        })
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TypedValue {
    None,
    Int(i32),
    Float(f32),
    String(String),
    Color(Color),
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::None => ValueKind::None,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::Color(_) => ValueKind::Color,
        }
    }

    /// Canonical string form: `%d`, `%f`, the raw string, or `r g b`.
    pub fn render(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => format!("{:.6}", value),
            Self::String(value) => value.clone(),
            Self::Color(value) => value.to_string(),
        }
    }

    /// Parses `literal` as a value of `kind`. Numeric kinds use C-style
    /// prefix parsing, so `"12abc"` is `12` and `"abc"` is `0`.
    /// Returns `None` for a color literal that does not scan as three integers.
    pub fn parse_as(kind: ValueKind, literal: &str) -> Option<Self> {
        match kind {
            ValueKind::None => Some(Self::None),
            ValueKind::Int => Some(Self::Int(parse_int_lenient(literal))),
            ValueKind::Float => Some(Self::Float(parse_float_lenient(literal))),
            ValueKind::String => Some(Self::String(literal.to_string())),
            ValueKind::Color => Color::scan(literal).map(Self::Color),
        }
    }

    pub fn default_for(kind: ValueKind) -> Self {
        match kind {
            ValueKind::None => Self::None,
            ValueKind::Int => Self::Int(0),
            ValueKind::Float => Self::Float(0.0),
            ValueKind::String => Self::String(String::new()),
            ValueKind::Color => Self::Color(Color::default()),
        }
    }
}

fn integer_prefix_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut cursor = 0usize;
    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }
    if cursor < bytes.len() && (bytes[cursor] == b'+' || bytes[cursor] == b'-') {
        cursor += 1;
    }
    let digits_start = cursor;
    while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
        cursor += 1;
    }
    if cursor == digits_start {
        0
    } else {
        cursor
    }
}

fn float_prefix_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut cursor = 0usize;
    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }
    if cursor < bytes.len() && (bytes[cursor] == b'+' || bytes[cursor] == b'-') {
        cursor += 1;
    }

    let rest = &bytes[cursor..];
    for word in ["infinity", "inf", "nan"] {
        if rest
            .get(..word.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(word.as_bytes()))
        {
            return cursor + word.len();
        }
    }

    let mut digits = 0usize;
    while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
        cursor += 1;
        digits += 1;
    }
    if cursor < bytes.len() && bytes[cursor] == b'.' {
        cursor += 1;
        while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
            cursor += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return 0;
    }

    if cursor < bytes.len() && (bytes[cursor] == b'e' || bytes[cursor] == b'E') {
        let mut exponent = cursor + 1;
        if exponent < bytes.len() && (bytes[exponent] == b'+' || bytes[exponent] == b'-') {
            exponent += 1;
        }
        let exponent_digits = exponent;
        while exponent < bytes.len() && bytes[exponent].is_ascii_digit() {
            exponent += 1;
        }
        if exponent > exponent_digits {
            cursor = exponent;
        }
    }
    cursor
}

fn parse_int_lenient_checked(text: &str) -> Option<i32> {
    let end = integer_prefix_len(text);
    if end == 0 {
        return None;
    }
    text[..end].trim_start().parse::<i32>().ok()
}

/// `atoi` semantics: leading whitespace, optional sign, digits; anything
/// else ends the number. Out-of-range values saturate.
pub fn parse_int_lenient(text: &str) -> i32 {
    let end = integer_prefix_len(text);
    if end == 0 {
        return 0;
    }
    match text[..end].trim_start().parse::<i64>() {
        Ok(value) => value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
        Err(_) => {
            if text.trim_start().starts_with('-') {
                i32::MIN
            } else {
                i32::MAX
            }
        }
    }
}

/// `atof` semantics over the longest numeric prefix.
pub fn parse_float_lenient(text: &str) -> f32 {
    let end = float_prefix_len(text);
    if end == 0 {
        return 0.0;
    }
    text[..end].trim_start().parse::<f32>().unwrap_or(0.0)
}

/// Scans up to `count` whitespace separated floats, leaving missing
/// components at zero. Returns how many were read.
pub fn scan_floats(text: &str, out: &mut [f32]) -> usize {
    let mut read = 0usize;
    for (slot, part) in out.iter_mut().zip(text.split_whitespace()) {
        let end = float_prefix_len(part);
        if end == 0 {
            break;
        }
        *slot = part[..end].parse::<f32>().unwrap_or(0.0);
        read += 1;
        if end != part.len() {
            break;
        }
    }
    read
}

/// Scans an `"x y z"` triple; all three components are required.
pub fn scan_vec3(text: &str) -> Option<Vec3> {
    let mut out = [0.0f32; 3];
    if scan_floats(text, &mut out) == 3 {
        Some(out)
    } else {
        None
    }
}
