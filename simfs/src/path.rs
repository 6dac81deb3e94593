use std::fmt;

/// Separates the names of a path.
pub const SEPARATOR: char = '/';
/// Makes the character that follows it part of the current token.
pub const ESCAPE: char = '\\';

/// Splits `input` on `sep`, honoring `\` escapes.
///
/// Runs of separators collapse into one boundary and trailing separators are
/// ignored. A leading separator produces a single empty first token, which is
/// how an absolute path is told apart from a relative one. The empty string
/// yields one empty token.
pub fn split_escaped(input: &str, sep: char) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    if chars.peek() == Some(&sep) {
        tokens.push(String::new());
    }

    while let Some(c) = chars.next() {
        if c == ESCAPE {
            // A dangling escape at the end of input is dropped.
            if let Some(literal) = chars.next() {
                current.push(literal);
            }
        } else if c == sep {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }

    if !current.is_empty() || tokens.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Splits a command line into its words. Spaces may be escaped to keep them
/// inside a word.
pub fn tokenize_command(line: &str) -> Vec<String> {
    split_escaped(line.trim_end_matches(&['\n', '\r'][..]), ' ')
        .into_iter()
        .filter(|word| !word.is_empty())
        .collect()
}

/// A tokenized path. Absolute paths are resolved from the root, relative ones
/// from the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FsPath {
    absolute: bool,
    segments: Vec<String>,
}

impl FsPath {
    /// Parses a slash delimited path. The empty string names the root.
    pub fn parse(path: &str) -> Self {
        let mut segments = split_escaped(path, SEPARATOR);
        let absolute = segments.first().map_or(false, |s| s.is_empty());
        if absolute {
            segments.remove(0);
        }
        Self { absolute, segments }
    }

    /// Builds an absolute path from a root-first list of names, the first of
    /// which is the root's own name.
    pub fn from_names(names: &[String]) -> Self {
        Self {
            absolute: true,
            segments: names.iter().skip(1).cloned().collect(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final name of the path, if there is one.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path with its final name removed.
    pub fn parent(&self) -> Option<FsPath> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            absolute: self.absolute,
            segments: rest.to_vec(),
        })
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "{}", SEPARATOR)?;
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            for c in segment.chars() {
                if c == SEPARATOR || c == ESCAPE {
                    write!(f, "{}", ESCAPE)?;
                }
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}
