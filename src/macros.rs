#[cfg(feature = "puffin")]
macro_rules! profile_function {
    ($($arg: tt)*) => {
        puffin::profile_function!($($arg)*);
    };
}

#[cfg(not(feature = "puffin"))]
macro_rules! profile_function {
    ($($arg: tt)*) => {};
}

#[cfg(feature = "puffin")]
macro_rules! profile_scope {
    ($($arg: tt)*) => {
        puffin::profile_scope!($($arg)*);
    };
}

#[cfg(not(feature = "puffin"))]
macro_rules! profile_scope {
    ($($arg: tt)*) => {};
}
