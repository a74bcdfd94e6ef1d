// Glob matching for in-process key enumeration, following Redis MATCH rules:
// `*`, `?`, `[...]` classes with `^` negation and `a-z` ranges, and `\` escapes.
// A `\` with nothing after it is a literal backslash, inside a class or out. Matching is case-sensitive.

#[derive(Debug, PartialEq)]
enum Token {
    Star,
    Any,
    Literal(char),
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Star | Token::Any => true,
            Token::Literal(literal) => *literal == c,
            Token::Class { negated, ranges } => {
                ranges.iter().any(|&(start, end)| start <= c && c <= end) != *negated
            }
        }
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                if tokens.last() != Some(&Token::Star) {
                    tokens.push(Token::Star);
                }
            }
            '?' => tokens.push(Token::Any),
            '\\' => match chars.get(i + 1) {
                Some(&escaped) => {
                    tokens.push(Token::Literal(escaped));
                    i += 1;
                }
                None => tokens.push(Token::Literal('\\')),
            },
            '[' => {
                i += 1;
                let negated = chars.get(i) == Some(&'^');
                if negated {
                    i += 1;
                }
                let mut ranges = Vec::new();
                // An unterminated class runs to the end of the pattern
                while i < chars.len() && chars[i] != ']' {
                    let c = chars[i];
                    if c == '\\' && i + 1 < chars.len() {
                        ranges.push((chars[i + 1], chars[i + 1]));
                        i += 2;
                    } else if i + 2 < chars.len() && chars[i + 1] == '-' {
                        let (start, end) = (c, chars[i + 2]);
                        ranges.push((start.min(end), start.max(end)));
                        i += 3;
                    } else {
                        ranges.push((c, c));
                        i += 1;
                    }
                }
                tokens.push(Token::Class { negated, ranges });
            }
            c => tokens.push(Token::Literal(c)),
        }
        i += 1;
    }

    tokens
}

pub fn glob_match(pattern: &str, key: &str) -> bool {
    let tokens = tokenize(pattern);
    let key: Vec<char> = key.chars().collect();

    let (mut t, mut k) = (0, 0);
    // Position of the last `*` and the key position it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match tokens.get(t) {
            Some(Token::Star) => {
                backtrack = Some((t, k));
                t += 1;
                continue;
            }
            Some(token) if token.matches(key[k]) => {
                t += 1;
                k += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((star, tried)) => {
                t = star + 1;
                k = tried + 1;
                backtrack = Some((star, tried + 1));
            }
            None => return false,
        }
    }

    tokens[t..].iter().all(|token| *token == Token::Star)
}
