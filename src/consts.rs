/// Sentinel variable target that resolves to the size of the player roster
/// instead of a column id.
pub const PLAYER_COUNT_ID: &str = "__PLAYER_COUNT__";

/// Auto columns refuse to recurse past this depth. A circular variable
/// reference degrades to a stable 0 instead of blowing the stack.
pub const MAX_AUTO_DEPTH: u8 = 5;

/// Identifier tokens reserved for the formula built-ins; never treated as
/// user variables or lookup functions.
pub const MATH_KEYWORDS: [&str; 14] = [
    "min", "max", "floor", "ceil", "round", "abs", "sin", "cos", "tan", "log", "sqrt", "pow",
    "pi", "e",
];
