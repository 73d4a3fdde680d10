use std::fmt;

/// The declared data type of a port.
///
/// Only the numeric variants participate in computation; [`DType::Str`]
/// ports are pass-through and never appear on an arithmetic path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    I32,
    F32,
    F64,
    Str,
}

impl DType {
    /// Whether this type participates in arithmetic.
    pub fn is_numeric(self) -> bool {
        !matches!(self, DType::Str)
    }

    /// The type-appropriate zero value, used to initialize a port at load.
    pub fn zero(self) -> Value {
        match self {
            DType::I32 => Value::I32(0),
            DType::F32 => Value::F32(0.0),
            DType::F64 => Value::F64(0.0),
            DType::Str => Value::Str(String::new()),
        }
    }

    /// Size in bytes of this type's `#[repr(C)]` field in a generated
    /// `Inputs`/`Outputs` record, used to compute the AOT descriptor
    /// tables' `byte_offset_into_Inputs` column. `Str` has no fixed
    /// size and never appears as a `DeviceTrigger`'s declared type in a
    /// well-formed graph.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::I32 => 4,
            DType::F32 => 4,
            DType::F64 => 8,
            DType::Str => 0,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::I32 => "i32",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::Str => "string",
        };
        f.write_str(s)
    }
}

/// The tagged scalar carried on every port.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I32(i32),
    F32(f32),
    F64(f64),
    Str(String),
}

impl Value {
    pub fn dtype(&self) -> DType {
        match self {
            Value::I32(_) => DType::I32,
            Value::F32(_) => DType::F32,
            Value::F64(_) => DType::F64,
            Value::Str(_) => DType::Str,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Value::I32(v) => *v,
            Value::F32(v) => *v as i32,
            Value::F64(v) => *v as i32,
            Value::Str(_) => 0,
        }
    }

    pub fn as_f32(&self) -> f32 {
        match self {
            Value::I32(v) => *v as f32,
            Value::F32(v) => *v,
            Value::F64(v) => *v as f32,
            Value::Str(_) => 0.0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::I32(v) => *v as f64,
            Value::F32(v) => *v as f64,
            Value::F64(v) => *v,
            Value::Str(_) => 0.0,
        }
    }

    /// Coerce this value to the given destination type following the
    /// edge-write coercion rules: integer<->float uses truncation toward
    /// zero, f32<->f64 uses standard IEEE-754 rounding. Non-numeric
    /// values pass through unchanged when the destination is also
    /// non-numeric; coercing a string to a numeric type yields that
    /// type's zero (load-time type checking is expected to prevent this
    /// case from ever being exercised).
    pub fn coerce(&self, to: DType) -> Value {
        match to {
            DType::I32 => Value::I32(self.as_i32()),
            DType::F32 => Value::F32(self.as_f32()),
            DType::F64 => Value::F64(self.as_f64()),
            DType::Str => match self {
                Value::Str(s) => Value::Str(s.clone()),
                _ => Value::Str(String::new()),
            },
        }
    }

    /// Change-detection equality used by the scheduler to decide whether
    /// to propagate a node's primary output to its dependents.
    ///
    /// Integers compare exactly. Floats compare bitwise-by-value after
    /// normalizing `-0.0` to `+0.0`, which makes `0.0 == -0.0` for this
    /// purpose and makes a NaN output compare equal to a prior
    /// identical-bit-pattern NaN (so it does not propagate indefinitely).
    /// Strings compare byte-equal.
    pub fn change_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => canonical_f32_bits(*a) == canonical_f32_bits(*b),
            (Value::F64(a), Value::F64(b)) => canonical_f64_bits(*a) == canonical_f64_bits(*b),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

/// Sum a sequence of values in the given compute type, reading each
/// input coerced to that type first (spec §4.2: "inputs are first read
/// as the node's declared output type ... summed ... in that type").
/// Shared verbatim by the interpreter's `Add` node and the AOT
/// generator's IR, so the parity requirement in spec §8 holds
/// structurally rather than only by test.
pub fn sum_values<'a>(compute_type: DType, values: impl Iterator<Item = &'a Value>) -> Value {
    match compute_type {
        DType::I32 => Value::I32(values.fold(0i32, |acc, v| acc.wrapping_add(v.as_i32()))),
        DType::F32 => Value::F32(values.fold(0f32, |acc, v| acc + v.as_f32())),
        DType::F64 => Value::F64(values.fold(0f64, |acc, v| acc + v.as_f64())),
        DType::Str => Value::Str(String::new()),
    }
}

fn canonical_f32_bits(v: f32) -> u32 {
    if v == 0.0 {
        0.0f32.to_bits()
    } else {
        v.to_bits()
    }
}

fn canonical_f64_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}
