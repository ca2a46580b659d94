use std::str::FromStr;

use log::trace;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{cut, map, opt},
    multi::separated_list1,
    number::complete::double,
    sequence::{delimited, preceded, terminated},
};

use crate::error::{Error, Result};


/// Trees nested deeper than this are rejected before parsing.
pub const MAX_NESTING_DEPTH: usize = 2048;

/// Stack size for threads that parse or draw trees of up to [`MAX_NESTING_DEPTH`] levels.
pub const RECURSION_STACK_SIZE: usize = 64 * 1024 * 1024;

/// A node of a phylogenetic tree together with the branch leading into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Clade {
    pub name: Option<String>,
    pub branch_length: Option<f64>,
    pub children: Vec<Clade>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub root: Clade,
}

impl Clade {
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    /// The name of the clade, or the empty string for unnamed clades.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// The terminal descendants of this clade, from left to right.
    pub fn terminals(&self) -> Vec<&Clade> {
        let mut terminals = Vec::new();
        self.collect_terminals(&mut terminals);
        terminals
    }

    fn collect_terminals<'clade>(&'clade self, terminals: &mut Vec<&'clade Clade>) {
        if self.is_terminal() {
            terminals.push(self);
        } else {
            for child in &self.children {
                child.collect_terminals(terminals);
            }
        }
    }
}

impl Tree {
    /// Parses a single Newick tree terminated by `;`.
    ///
    /// Internal node labels (such as bootstrap support values) are kept as names.
    /// Quoted labels are supported, bracketed comments are not.
    pub fn parse(input: &str) -> Result<Self> {
        trace!("Parsing Newick tree of {} bytes", input.len());
        check_nesting_depth(input)?;

        match parse_tree(input) {
            Ok(("", root)) => Ok(Self { root }),
            Ok((rest, _)) => Err(Error::MalformedTree {
                offset: input.len() - rest.len(),
                reason: "unexpected input after the terminating ';'".to_string(),
            }),
            Err(nom::Err::Error(error) | nom::Err::Failure(error)) => Err(Error::MalformedTree {
                offset: input.len() - error.input.len(),
                reason: format!("expected {:?}", error.code),
            }),
            Err(nom::Err::Incomplete(_)) => Err(Error::MalformedTree {
                offset: input.len(),
                reason: "incomplete input".to_string(),
            }),
        }
    }

    pub fn terminals(&self) -> Vec<&Clade> {
        self.root.terminals()
    }
}

impl FromStr for Tree {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        Self::parse(input)
    }
}

/// Scans the parentheses without recursing, so that the recursive parser only sees bounded depths.
fn check_nesting_depth(input: &str) -> Result<()> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (offset, c) in input.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => {
                depth += 1;
                if depth > MAX_NESTING_DEPTH {
                    return Err(Error::MalformedTree {
                        offset,
                        reason: format!("nested deeper than {MAX_NESTING_DEPTH} levels"),
                    });
                }
            }
            ')' if !quoted => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

fn parse_tree(input: &str) -> IResult<&str, Clade> {
    let (input, root) = parse_clade(input)?;
    let (input, _) = preceded(multispace0, char(';'))(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, root))
}

fn parse_clade(input: &str) -> IResult<&str, Clade> {
    let (input, _) = multispace0(input)?;
    let (input, children) = opt(preceded(
        char('('),
        cut(terminated(
            separated_list1(preceded(multispace0, char(',')), parse_clade),
            preceded(multispace0, char(')')),
        )),
    ))(input)?;
    let (input, name) = opt(preceded(multispace0, parse_label))(input)?;
    let (input, branch_length) = opt(preceded(
        preceded(multispace0, char(':')),
        preceded(multispace0, double),
    ))(input)?;

    Ok((
        input,
        Clade {
            name,
            branch_length,
            children: children.unwrap_or_default(),
        },
    ))
}

fn parse_label(input: &str) -> IResult<&str, String> {
    alt((
        map(
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            str::to_string,
        ),
        map(take_while1(is_unquoted_label_character), str::to_string),
    ))(input)
}

fn is_unquoted_label_character(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | ',' | ':' | ';' | '\'' | '[' | ']')
}
