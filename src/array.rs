use std::fmt;

use num_complex::Complex64;

use crate::error::{Error, Result};
use crate::type_str::{TypeChar, TypeStr};
use crate::value::{float_str, Value};

/// Flat, row-major element storage of an [`Array`].
///
/// Each variant covers every size of one [`TypeChar`]; the array's dtype records the width the
/// data came from and goes back to on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Uint(Vec<u64>),
    Float(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::Uint(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn type_char(&self) -> TypeChar {
        match self {
            ArrayData::Bool(_) => TypeChar::Bool,
            ArrayData::Int(_) => TypeChar::Int,
            ArrayData::Uint(_) => TypeChar::Uint,
            ArrayData::Float(_) => TypeChar::Float,
            ArrayData::Complex(_) => TypeChar::Complex,
        }
    }

    /// Element `i` as a scalar [`Value`].  Complex elements have no scalar form.
    fn scalar(&self, i: usize) -> Value {
        match self {
            ArrayData::Bool(v) => Value::Bool(v[i]),
            ArrayData::Int(v) => Value::Int(v[i]),
            ArrayData::Uint(v) => match i64::try_from(v[i]) {
                Ok(x) => Value::Int(x),
                Err(_) => Value::Float(v[i] as f64),
            },
            ArrayData::Float(v) => Value::Float(v[i]),
            ArrayData::Complex(_) => Value::None,
        }
    }
}

/// An n-dimensional numeric array: the value of a float-array item.
///
/// ```
/// use guidata::{Array, Value};
///
/// let a = Array::from_shape_f64(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0])?;
/// assert_eq!(a.dtype().name(), "float64");
/// assert_eq!(
///     a.to_value_list(),
///     Value::Seq(vec![
///         Value::Seq(vec![Value::Float(1.0), Value::Float(2.0)]),
///         Value::Seq(vec![Value::Float(3.0), Value::Float(4.0)]),
///     ]),
/// );
/// # Ok::<(), guidata::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    dtype: TypeStr,
    shape: Vec<u64>,
    data: ArrayData,
}

impl Array {
    /// Build an array, checking that the storage matches the dtype and the shape.
    pub fn new(dtype: TypeStr, shape: Vec<u64>, data: ArrayData) -> Result<Self> {
        if dtype.type_char() != data.type_char() {
            return Err(Error::InvalidArray(format!(
                "dtype {} does not match {:?} storage", dtype.name(), data.type_char(),
            )));
        }
        let expected: u64 = shape.iter().product();
        if expected != data.len() as u64 {
            return Err(Error::InvalidArray(format!(
                "shape {:?} needs {} elements, got {}", shape, expected, data.len(),
            )));
        }
        Ok(Array { dtype, shape, data })
    }

    /// A 1-D `float64` array.
    pub fn from_f64(data: Vec<f64>) -> Self {
        let shape = vec![data.len() as u64];
        Array { dtype: TypeStr::FLOAT64, shape, data: ArrayData::Float(data) }
    }

    /// A `float64` array of the given shape.
    pub fn from_shape_f64(shape: Vec<u64>, data: Vec<f64>) -> Result<Self> {
        Array::new(TypeStr::FLOAT64, shape, ArrayData::Float(data))
    }

    pub fn dtype(&self) -> TypeStr { self.dtype }
    pub fn shape(&self) -> &[u64] { &self.shape }
    pub fn data(&self) -> &ArrayData { &self.data }
    pub fn into_data(self) -> ArrayData { self.data }
    pub fn ndim(&self) -> usize { self.shape.len() }

    /// Total number of elements.
    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Promote a 0-d array to shape `[1]`; higher dimensions are left alone.
    pub fn at_least_1d(mut self) -> Self {
        if self.shape.is_empty() {
            self.shape.push(1);
        }
        self
    }

    /// All elements as `f64`, in storage order.  `None` for complex arrays.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match &self.data {
            ArrayData::Bool(v) => Some(v.iter().map(|&b| b as u8 as f64).collect()),
            ArrayData::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            ArrayData::Uint(v) => Some(v.iter().map(|&x| x as f64).collect()),
            ArrayData::Float(v) => Some(v.clone()),
            ArrayData::Complex(_) => None,
        }
    }

    /// Nested lists in the layout NumPy's `tolist()` produces.
    ///
    /// Complex arrays become the list of real parts followed by the list of imaginary parts,
    /// concatenated along the first axis.
    pub fn to_value_list(&self) -> Value {
        match &self.data {
            ArrayData::Complex(v) => {
                let re = ArrayData::Float(v.iter().map(|c| c.re).collect());
                let im = ArrayData::Float(v.iter().map(|c| c.im).collect());
                let (re, im) = (nest(&re, &self.shape), nest(&im, &self.shape));
                match (re, im) {
                    (Value::Seq(mut re), Value::Seq(im)) => {
                        re.extend(im);
                        Value::Seq(re)
                    },
                    (re, im) => Value::Seq(vec![re, im]),
                }
            },
            data => nest(data, &self.shape),
        }
    }

    /// Inverse of [`Array::to_value_list`]: infer the shape from the nesting and cast every
    /// element to `dtype`.
    pub fn from_value_list(value: &Value, dtype: TypeStr) -> Result<Self> {
        let mut shape = vec![];
        let mut flat = vec![];
        flatten(value, 0, &mut shape, &mut flat)?;

        let data = match dtype.type_char() {
            TypeChar::Bool => ArrayData::Bool(flat.iter().map(|v| element_f64(v).map(|x| x != 0.0)).collect::<Result<_>>()?),
            TypeChar::Int => ArrayData::Int(flat.iter().map(element_i64).collect::<Result<_>>()?),
            TypeChar::Uint => ArrayData::Uint(flat.iter().map(element_u64).collect::<Result<_>>()?),
            TypeChar::Float => ArrayData::Float(flat.iter().map(element_f64).collect::<Result<_>>()?),
            TypeChar::Complex => {
                match shape.first_mut() {
                    Some(first) if *first % 2 == 0 => *first /= 2,
                    _ => return Err(Error::InvalidArray("complex data must hold real and imaginary halves".into())),
                }
                let (re, im) = flat.split_at(flat.len() / 2);
                ArrayData::Complex(re.iter().zip(im)
                    .map(|(re, im)| -> Result<Complex64> { Ok(Complex64::new(element_f64(re)?, element_f64(im)?)) })
                    .collect::<Result<_>>()?)
            },
        };
        Array::new(dtype, shape, data)
    }

    /// The `["array", data, "dtype"]` triple used where arrays are stored as plain lists.
    pub fn to_tagged(&self) -> Value {
        Value::Seq(vec!["array".into(), self.to_value_list(), self.dtype.name().into()])
    }

    /// Decode a [`to_tagged`](Self::to_tagged) triple.  `None` when `value` is any other list.
    pub fn from_tagged(value: &Value) -> Option<Self> {
        match value.as_seq()? {
            [Value::Str(tag), data, Value::Str(dtype)] if tag == "array" => {
                let dtype = TypeStr::from_name_or_str(dtype)?;
                Array::from_value_list(data, dtype).ok()
            },
            _ => None,
        }
    }
}

fn nest(data: &ArrayData, shape: &[u64]) -> Value {
    fn go(data: &ArrayData, shape: &[u64], offset: usize) -> Value {
        match shape.split_first() {
            None => data.scalar(offset),
            Some((&n, rest)) => {
                let stride: u64 = rest.iter().product();
                Value::Seq((0..n).map(|i| go(data, rest, offset + (i * stride) as usize)).collect())
            },
        }
    }
    go(data, shape, 0)
}

fn flatten<'a>(value: &'a Value, depth: usize, shape: &mut Vec<u64>, flat: &mut Vec<&'a Value>) -> Result<()> {
    match value {
        Value::Seq(items) => {
            match shape.get(depth) {
                None if depth == shape.len() && flat.is_empty() => shape.push(items.len() as u64),
                Some(&n) if n == items.len() as u64 => {},
                _ => return Err(Error::InvalidArray("ragged nested sequence".into())),
            }
            for item in items {
                flatten(item, depth + 1, shape, flat)?;
            }
            Ok(())
        },
        scalar => {
            if depth != shape.len() {
                return Err(Error::InvalidArray("ragged nested sequence".into()));
            }
            flat.push(scalar);
            Ok(())
        },
    }
}

fn element_f64(v: &&Value) -> Result<f64> {
    match **v {
        Value::Bool(b) => Ok(b as u8 as f64),
        Value::Int(i) => Ok(i as f64),
        Value::Float(x) => Ok(x),
        // JSON stores non-finite floats as null
        Value::None => Ok(f64::NAN),
        ref other => Err(Error::InvalidArray(format!("array element cannot be {}", other.kind_name()))),
    }
}

fn element_i64(v: &&Value) -> Result<i64> {
    match **v {
        Value::Bool(b) => Ok(b as i64),
        Value::Int(i) => Ok(i),
        Value::Float(x) if x.is_finite() => Ok(x.trunc() as i64),
        ref other => Err(Error::InvalidArray(format!("integer array element cannot be {}", other))),
    }
}

fn element_u64(v: &&Value) -> Result<u64> {
    match **v {
        Value::Bool(b) => Ok(b as u64),
        Value::Int(i) if i >= 0 => Ok(i as u64),
        Value::Float(x) if x.is_finite() && x >= 0.0 => Ok(x.trunc() as u64),
        ref other => Err(Error::InvalidArray(format!("unsigned array element cannot be {}", other))),
    }
}

/// NumPy-like text: `[1.0 2.0 3.0]`, nested per axis.
impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn write_level(f: &mut fmt::Formatter, a: &Array, shape: &[u64], offset: usize) -> fmt::Result {
            let Some((&n, rest)) = shape.split_first() else {
                return match &a.data {
                    ArrayData::Bool(v) => write!(f, "{}", if v[offset] { "True" } else { "False" }),
                    ArrayData::Int(v) => write!(f, "{}", v[offset]),
                    ArrayData::Uint(v) => write!(f, "{}", v[offset]),
                    ArrayData::Float(v) => f.write_str(&float_str(v[offset])),
                    ArrayData::Complex(v) => write!(f, "({}{:+}j)", v[offset].re, v[offset].im),
                };
            };
            let stride: u64 = rest.iter().product();
            f.write_str("[")?;
            for i in 0..n {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write_level(f, a, rest, offset + (i * stride) as usize)?;
            }
            f.write_str("]")
        }
        write_level(f, self, &self.shape, 0)
    }
}
