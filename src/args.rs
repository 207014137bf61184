//! Command string splitting and joining.

/// Split a command string into arguments.
///
/// Spaces separate arguments unless they appear inside single or double
/// quotes. A quote preceded by a backslash is kept literally (backslash
/// included). A closing quote always ends the current argument, so `''`
/// yields an empty argument.
#[must_use]
pub fn parse_arguments(command: &str) -> Vec<String> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut previous: Option<char> = None;

    for ch in command.chars() {
        let escaped = previous == Some('\\');
        match ch {
            ' ' => {
                if in_single_quote || in_double_quote {
                    current.push(ch);
                } else if !current.is_empty() {
                    arguments.push(std::mem::take(&mut current));
                }
            }
            '\'' if !escaped => {
                if in_single_quote {
                    in_single_quote = false;
                    arguments.push(std::mem::take(&mut current));
                } else if in_double_quote {
                    current.push(ch);
                } else {
                    in_single_quote = true;
                }
            }
            '"' if !escaped => {
                if in_double_quote {
                    in_double_quote = false;
                    arguments.push(std::mem::take(&mut current));
                } else if in_single_quote {
                    current.push(ch);
                } else {
                    in_double_quote = true;
                }
            }
            _ => current.push(ch),
        }
        previous = Some(ch);
    }

    if !current.is_empty() {
        arguments.push(current);
    }

    arguments
}

/// Join arguments with single spaces.
#[must_use]
pub fn arguments_to_string<S: AsRef<str>>(arguments: &[S]) -> String {
    arguments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}
