//! Logging shims. With the `defmt` feature these forward to `defmt`, otherwise
//! they compile to nothing.

#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)*) => {
        defmt::trace!($($arg)*)
    };
}

#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($arg:tt)*) => {
        defmt::debug!($($arg)*)
    };
}

#[cfg(not(feature = "defmt"))]
macro_rules! trace {
    ($($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}

pub(crate) use debug;
pub(crate) use trace;
