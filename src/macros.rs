//! Useful macros.

/// Join the given path components with `/`. Components may be `&str` or `String`.
///
/// ```rust,ignore
/// assert_eq!(dir!("matrix-cores", "src"), "matrix-cores/src");
/// ```
#[macro_export]
macro_rules! dir {
    ($first:expr $(, $part:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut path = String::from($first);
        $(
            if !path.ends_with('/') {
                path.push('/');
            }
            path.push_str($part.trim_start_matches('/'));
        )*
        path
    }};
}

/// Build a `Cmd` from a program and its arguments. Every argument becomes exactly one element of
/// the child's argument vector, so nothing needs to be quoted.
///
/// ```rust,ignore
/// let cmd = cmd!("make", "all", "-j", "-B", "-C", bench_dir);
/// ```
#[macro_export]
macro_rules! cmd {
    ($prog:expr $(, $arg:expr)* $(,)?) => {
        $crate::shell::Cmd::new($prog)$(.arg($arg))*
    };
}

/// Time the given expression, pushing `($label, duration)` to `$timers`. Evaluates to the value
/// of the expression.
#[macro_export]
macro_rules! time {
    ($timers:ident, $label:expr, $expr:expr) => {{
        let start = std::time::Instant::now();
        let result = $expr;
        $timers.push(($label, start.elapsed()));
        result
    }};
}
