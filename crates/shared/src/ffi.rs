/* Copyright (c) 2017-2021 Jeremy Davis (jeremydavis519@gmail.com)
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy of this software
 * and associated documentation files (the "Software"), to deal in the Software without restriction,
 * including without limitation the rights to use, copy, modify, merge, publish, distribute,
 * sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all copies or
 * substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
 * NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
 * DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
 */

//! Helpers for values that cross the boundary between Rust and the assembly trap stubs (or user
//! mode). Such values arrive as plain integers, and they have to be checked before they can be
//! trusted as enum discriminants.

use {
    core::fmt,
    error::Error
};

/// Wraps enum definitions with specific `#[repr]`s, adding checked conversions from the
/// underlying integer type and a list of every variant.
///
/// ```
/// # use shared::ffi_enum;
/// ffi_enum! {
///     #[repr(u8)]
///     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
///     pub enum Mode {
///         User = 0x10,
///         Supervisor = 0x13,
///     }
/// }
/// # use core::convert::TryFrom;
/// assert_eq!(Mode::try_from(0x13).ok(), Some(Mode::Supervisor));
/// assert!(Mode::try_from(0x11).is_err());
/// assert_eq!(Mode::ALL.len(), 2);
/// ```
#[macro_export]
macro_rules! ffi_enum {
    ($(
        #[repr( $base_type:tt )]
        $(#[$post_attr:meta])*
        $vis:vis enum $enum:ident {
            $(
                $(#[$variant_attr:meta])*
                $variant:ident $(= $val:expr)?
            ),* $(,)?
        }
      )*) => {
        $(
            #[repr($base_type)]
            $(#[$post_attr])*
            $vis enum $enum {
                $(
                    $(#[$variant_attr])*
                    $variant $(= $val)?
                ),*
            }
            impl $enum {
                /// Every variant of this enum, in declaration order.
                #[allow(dead_code)]
                $vis const ALL: &'static [$enum] = &[$($enum::$variant),*];
            }
            impl core::convert::TryFrom<$base_type> for $enum {
                type Error = $crate::ffi::InvalidVariantError<$base_type>;

                fn try_from(value: $base_type) -> Result<$enum, Self::Error> {
                    match value {
                        $(x if x == $enum::$variant as $base_type => Ok($enum::$variant),)*
                        value => Err($crate::ffi::InvalidVariantError::new(stringify!($enum), value))
                    }
                }
            }
            impl From<$enum> for $base_type {
                fn from(value: $enum) -> $base_type {
                    value as $base_type
                }
            }
        )*
    };
}

/// The error returned when an integer doesn't correspond to any variant of an enum defined with
/// `ffi_enum!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidVariantError<T: Into<Int128>+Copy+fmt::Debug> {
    enum_type: &'static str,
    value: T
}

impl<T: Into<Int128>+Copy+fmt::Debug> InvalidVariantError<T> {
    /// Records that `value` has no matching variant in the enum named `enum_type`.
    pub fn new(enum_type: &'static str, value: T) -> InvalidVariantError<T> {
        InvalidVariantError { enum_type, value }
    }

    /// The integer that failed to convert.
    pub fn value(&self) -> T {
        self.value
    }
}

impl<T: Into<Int128>+Copy+fmt::Debug> Error for InvalidVariantError<T> {}

impl<T: Into<Int128>+Copy+fmt::Debug> fmt::Display for InvalidVariantError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x} is not a valid `{}`", self.value.into(), self.enum_type)
    }
}

// Any primitive integer, widened so that `InvalidVariantError` can print it without caring about
// its signedness.
#[doc(hidden)]
#[derive(Debug, Clone, Copy)]
pub enum Int128 {
    Signed(i128),
    Unsigned(u128)
}

impl fmt::LowerHex for Int128 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Signed(x) if x < 0 => write!(f, "-{:#x}", x.unsigned_abs()),
            Self::Signed(x) => fmt::LowerHex::fmt(&x, f),
            Self::Unsigned(x) => fmt::LowerHex::fmt(&x, f)
        }
    }
}

macro_rules! impl_into_int128 {
    ($sign:ident: $($type:ty),*) => {
        $(
            impl From<$type> for Int128 {
                fn from(x: $type) -> Int128 {
                    Int128::$sign(x.into())
                }
            }
        )*
    };
}
impl_into_int128!(Signed: i8, i16, i32, i64, i128);
impl_into_int128!(Unsigned: u8, u16, u32, u64, u128);

#[cfg(test)]
mod tests {
    use core::convert::TryFrom;

    ffi_enum! {
        #[repr(u16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Sparse {
            Low = 0x0001,
            High = 0x0400,
        }

        #[repr(i32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Negative {
            Zero = 0,
            MinusOne = -1,
        }
    }

    #[test]
    fn should_convert_known_values() {
        assert_eq!(Sparse::try_from(0x400).ok(), Some(Sparse::High));
        assert_eq!(Negative::try_from(-1).ok(), Some(Negative::MinusOne));
        assert_eq!(u16::from(Sparse::Low), 1);
    }

    #[test]
    fn should_reject_gaps() {
        let error = Sparse::try_from(0x0002).unwrap_err();
        assert_eq!(error.value(), 2);
        assert_eq!(format!("{}", error), "0x2 is not a valid `Sparse`");
    }

    #[test]
    fn should_print_negative_values() {
        let error = Negative::try_from(-16).unwrap_err();
        assert_eq!(format!("{}", error), "-0x10 is not a valid `Negative`");
    }

    #[test]
    fn all_should_list_variants_in_order() {
        assert_eq!(Sparse::ALL, &[Sparse::Low, Sparse::High]);
    }
}
