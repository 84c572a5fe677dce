mod closure;
mod common;
mod grading;
mod transitions;
