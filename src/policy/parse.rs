//! The policy language: one statement per line, compiled to a [`RuleList`].
//!
//! ```text
//! # measure system binaries
//! @@define BINMASK +pinugtsdbmC
//! /usr/bin        -> $(ReadOnly)+S (rulename = Binaries, severity = 90) ;
//! /var/log        -> $(Growing) (recurse = 2) ;
//! !/usr/bin/local ;
//! ```
//!
//! A `!path` statement adds a stop point to the enclosing rule (the one
//! whose start point lies above the path). Mask specs start empty; `+`
//! turns the following characters on, `-` turns them off, and `$(NAME)`
//! splices a variable.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::fco::name::FcoName;
use crate::fco::prop::Prop;
use crate::fco::prop_vector::PropVector;
use crate::policy::rule::{Rule, RuleAttr, MAX_SEVERITY};
use crate::policy::rule_list::RuleList;

/// Property selected by each mask character.
fn mask_char(c: char) -> Option<Prop> {
    Some(match c {
        'p' => Prop::Mode,
        'i' => Prop::Inode,
        'n' => Prop::NLink,
        'u' => Prop::Uid,
        'g' => Prop::Gid,
        't' => Prop::FileType,
        's' => Prop::Size,
        'l' => Prop::GrowingFile,
        'd' => Prop::Dev,
        'r' => Prop::RDev,
        'b' => Prop::Blocks,
        'z' => Prop::BlockSize,
        'a' => Prop::AccessTime,
        'm' => Prop::ModifyTime,
        'c' => Prop::CreateTime,
        'C' => Prop::Crc32,
        'M' => Prop::Md5,
        'S' => Prop::Sha1,
        'H' => Prop::Haval,
        _ => return None,
    })
}

fn predefined_variables() -> HashMap<String, PropVector> {
    let mut vars = HashMap::new();
    vars.insert(
        "ReadOnly".to_owned(),
        PropVector::of(&[
            Prop::Mode,
            Prop::Inode,
            Prop::NLink,
            Prop::Uid,
            Prop::Gid,
            Prop::FileType,
            Prop::Size,
            Prop::Dev,
            Prop::Blocks,
            Prop::ModifyTime,
            Prop::Crc32,
            Prop::Md5,
        ]),
    );
    vars.insert(
        "Growing".to_owned(),
        PropVector::of(&[
            Prop::Mode,
            Prop::Inode,
            Prop::NLink,
            Prop::Uid,
            Prop::Gid,
            Prop::FileType,
            Prop::Dev,
            Prop::GrowingFile,
        ]),
    );
    vars.insert(
        "Device".to_owned(),
        PropVector::of(&[
            Prop::Mode,
            Prop::Uid,
            Prop::Gid,
            Prop::FileType,
            Prop::Dev,
            Prop::RDev,
        ]),
    );
    vars.insert("IgnoreAll".to_owned(), PropVector::new());
    vars.insert("IgnoreNone".to_owned(), PropVector::all());
    vars
}

/// Parses a mask spec such as `$(ReadOnly)+S-b`.
fn parse_mask(spec: &str, vars: &HashMap<String, PropVector>, line: usize) -> Result<PropVector> {
    let mut mask = PropVector::new();
    let mut adding = true;
    let mut chars = spec.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            '$' => {
                if chars.next() != Some('(') {
                    return Err(Error::PolicyParse {
                        line,
                        msg: "expected '(' after '$'".to_owned(),
                    });
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(')') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(Error::PolicyParse {
                                line,
                                msg: "unterminated variable reference".to_owned(),
                            })
                        }
                    }
                }
                let var = vars
                    .get(name.trim())
                    .ok_or_else(|| Error::UndefinedVariable(name.trim().to_owned()))?;
                if adding {
                    mask |= var;
                } else {
                    for idx in var.iter().collect::<Vec<_>>() {
                        mask.remove_index(idx);
                    }
                }
            }
            c if c.is_whitespace() => {}
            c => {
                let prop = mask_char(c).ok_or(Error::BadMaskChar(c))?;
                if adding {
                    mask.add(prop);
                } else {
                    mask.remove(prop);
                }
            }
        }
    }
    Ok(mask)
}

/// Applies a `(key = value, ...)` attribute block to a rule.
fn parse_attrs(block: &str, rule: &mut Rule, attrs: &mut RuleAttr, line: usize) -> Result<()> {
    for item in block.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let (key, value) = item.split_once('=').ok_or_else(|| Error::PolicyParse {
            line,
            msg: format!("attribute '{item}' is not of the form key = value"),
        })?;
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "rulename" => attrs.name = value.to_owned(),
            "severity" => {
                let severity: u32 = value.parse().map_err(|_| Error::PolicyParse {
                    line,
                    msg: format!("severity '{value}' is not a number"),
                })?;
                if severity > MAX_SEVERITY {
                    return Err(Error::PolicyParse {
                        line,
                        msg: format!("severity {severity} exceeds {MAX_SEVERITY}"),
                    });
                }
                attrs.severity = severity;
            }
            "emailto" => attrs.email.push(value.to_owned()),
            "recurse" => match value.to_ascii_lowercase().as_str() {
                "true" => rule.set_recurse_depth(None),
                "false" => rule.set_start_point_only(),
                n => {
                    let depth: u32 = n.parse().map_err(|_| Error::PolicyParse {
                        line,
                        msg: format!("recurse '{value}' is not a number or true/false"),
                    })?;
                    rule.set_recurse_depth(Some(depth));
                }
            },
            other => {
                return Err(Error::PolicyParse {
                    line,
                    msg: format!("unknown attribute '{other}'"),
                })
            }
        }
    }
    Ok(())
}

/// Compiles policy source text into a rule list.
pub fn parse_policy(text: &str) -> Result<RuleList> {
    let mut vars = predefined_variables();
    let mut rules: Vec<Rule> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let stmt = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let stmt = stmt.trim().trim_end_matches(';').trim();
        if stmt.is_empty() {
            continue;
        }

        if let Some(rest) = stmt.strip_prefix("@@define") {
            let mut parts = rest.trim().splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or("").trim();
            let spec = parts.next().unwrap_or("").trim();
            if name.is_empty() || spec.is_empty() {
                return Err(Error::PolicyParse {
                    line,
                    msg: "@@define needs a name and a mask".to_owned(),
                });
            }
            let mask = parse_mask(spec, &vars, line)?;
            vars.insert(name.to_owned(), mask);
            continue;
        }

        if let Some(rest) = stmt.strip_prefix('!') {
            let path = rest.trim();
            if !path.starts_with('/') {
                return Err(Error::PathNotAbsolute(path.to_owned()));
            }
            let point = FcoName::from_path(path);
            let owner = rules
                .iter_mut()
                .filter(|rule| {
                    matches!(
                        rule.start_point().relationship(&point),
                        crate::fco::name::Rel::Above
                    )
                })
                .max_by_key(|rule| rule.start_point().len());
            match owner {
                Some(rule) => rule.add_stop_point(point).map_err(|e| match e {
                    Error::PolicyParse { msg, .. } => Error::PolicyParse { line, msg },
                    e => e,
                })?,
                None => {
                    return Err(Error::PolicyParse {
                        line,
                        msg: format!("stop point {path} lies under no rule"),
                    })
                }
            }
            continue;
        }

        let (path, spec) = stmt.split_once("->").ok_or_else(|| Error::PolicyParse {
            line,
            msg: "expected 'path -> mask'".to_owned(),
        })?;
        let path = path.trim();
        if !path.starts_with('/') {
            return Err(Error::PathNotAbsolute(path.to_owned()));
        }

        let spec = spec.trim();
        // an attribute block opens with a '(' that is not part of a
        // `$(variable)` reference
        let attr_open = spec
            .char_indices()
            .find(|(i, c)| *c == '(' && (*i == 0 || spec.as_bytes()[i - 1] != b'$'))
            .map(|(i, _)| i);
        let (mask_spec, attr_block) = match attr_open {
            Some(pos) => {
                let close = spec.rfind(')').ok_or_else(|| Error::PolicyParse {
                    line,
                    msg: "unterminated attribute block".to_owned(),
                })?;
                if close <= pos {
                    return Err(Error::PolicyParse {
                        line,
                        msg: "unterminated attribute block".to_owned(),
                    });
                }
                (&spec[..pos], Some(&spec[pos + 1..close]))
            }
            None => (spec, None),
        };

        let mask = parse_mask(mask_spec.trim(), &vars, line)?;
        let mut attrs = RuleAttr { name: String::new(), severity: 0, email: Vec::new() };
        let mut rule = Rule::new(FcoName::from_path(path), mask, RuleAttr::default());
        if let Some(block) = attr_block {
            parse_attrs(block, &mut rule, &mut attrs, line)?;
        }
        if attrs.name.is_empty() {
            attrs.name = path.to_owned();
        }
        rule.set_attrs(attrs);
        rules.push(rule);
    }

    let mut list = RuleList::new();
    for rule in rules {
        list.insert(rule)?;
    }
    Ok(list)
}
