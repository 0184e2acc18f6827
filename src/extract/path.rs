use regex::Regex;

use crate::error::ConfigError;

/// 数据文件路径改写：对 `file_name` 做一次正则替换（全部匹配）。
///
/// 替换串接受 `\1`、`\g<name>` 形式的反向引用，与 `${1}` 等价；
/// 其余 `$` 按字面处理。
#[derive(Clone, Debug)]
pub struct PathRewrite {
    re: Regex,
    replacement: String,
}

impl PathRewrite {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self, ConfigError> {
        let re = Regex::new(pattern).map_err(|source| ConfigError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            re,
            replacement: translate_replacement(replacement),
        })
    }

    pub fn apply(&self, path: &str) -> String {
        self.re
            .replace_all(path, self.replacement.as_str())
            .into_owned()
    }
}

fn translate_replacement(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + 4);
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('g') => {
                    let mut probe = chars.clone();
                    probe.next();
                    if probe.next() == Some('<') {
                        let name: String = probe.by_ref().take_while(|&c| c != '>').collect();
                        out.push_str(&format!("${{{name}}}"));
                        chars = probe;
                    } else {
                        out.push('\\');
                    }
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}
