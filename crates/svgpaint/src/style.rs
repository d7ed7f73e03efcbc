//! Stylesheet rules, selector matching and specificity.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::element::Element;
use crate::util::{compress_spaces, parse_external_url};

/// Specificity serialized so that string order equals rank order.
pub fn selector_specificity(selector: &str) -> String {
    let (ids, classes, types) = match parse_selector(selector) {
        Some(parts) => parts.iter().fold((0, 0, 0), |(a, b, c), (compound, _)| {
            let (ids, classes, types) = compound.specificity();
            (a + ids, b + classes, c + types)
        }),
        None => fallback_specificity(selector),
    };
    format!("{:03}{:03}{:03}", ids, classes, types)
}

/// Rough counts for selectors the matcher cannot parse.
fn fallback_specificity(selector: &str) -> (usize, usize, usize) {
    let ids = selector.matches('#').count();
    let classes = selector.matches('.').count() + selector.matches('[').count();
    let types = selector
        .split(|c: char| c.is_whitespace() || matches!(c, '>' | '+' | '~'))
        .filter(|part| part.starts_with(|c: char| c.is_ascii_alphabetic()))
        .count();
    (ids, classes, types)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttributeTest {
    Present(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeTest>,
    /// Pseudo-classes never match.
    pseudo: usize,
}

impl Compound {
    fn specificity(&self) -> (usize, usize, usize) {
        (
            self.ids.len(),
            self.classes.len() + self.attributes.len() + self.pseudo,
            usize::from(self.tag.is_some()),
        )
    }

    fn matches(&self, element: &Element) -> bool {
        if self.pseudo > 0 {
            return false;
        }
        if let Some(tag) = &self.tag {
            if element.tag() != tag {
                return false;
            }
        }
        let attribute = |name: &str| element.raw_attribute(name);
        if self
            .ids
            .iter()
            .any(|id| attribute("id").as_deref() != Some(id.as_str()))
        {
            return false;
        }
        if !self.classes.is_empty() {
            let class = attribute("class").unwrap_or_default();
            let list: Vec<&str> = class.split_whitespace().collect();
            if !self.classes.iter().all(|c| list.contains(&c.as_str())) {
                return false;
            }
        }
        self.attributes.iter().all(|test| match test {
            AttributeTest::Present(name) => attribute(name).is_some(),
            AttributeTest::Equals(name, value) => attribute(name).as_deref() == Some(value.as_str()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// Compounds left to right, each with the combinator linking it to the next one.
type Selector = Vec<(Compound, Option<Combinator>)>;

fn parse_selector(selector: &str) -> Option<Selector> {
    let mut parts: Selector = Vec::new();
    let mut pending: Option<Combinator> = None;
    let chars: Vec<char> = selector.trim().chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            if !parts.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            i += 1;
            continue;
        }
        if c == '>' {
            if parts.is_empty() {
                return None;
            }
            pending = Some(Combinator::Child);
            i += 1;
            continue;
        }
        if matches!(c, '+' | '~' | ',') {
            return None;
        }

        let (compound, next) = parse_compound(&chars, i)?;
        if let Some(last) = parts.last_mut() {
            last.1 = Some(pending.take()?);
        }
        parts.push((compound, None));
        i = next;
    }

    if parts.is_empty() || pending.is_some() {
        return None;
    }
    Some(parts)
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_')
}

fn read_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_ident(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn parse_compound(chars: &[char], mut i: usize) -> Option<(Compound, usize)> {
    let mut compound = Compound::default();
    let start = i;

    while i < chars.len() {
        match chars[i] {
            '*' => i += 1,
            '#' => {
                let (ident, next) = read_ident(chars, i + 1);
                if ident.is_empty() {
                    return None;
                }
                compound.ids.push(ident);
                i = next;
            }
            '.' => {
                let (ident, next) = read_ident(chars, i + 1);
                if ident.is_empty() {
                    return None;
                }
                compound.classes.push(ident);
                i = next;
            }
            '[' => {
                let close = chars[i..].iter().position(|&c| c == ']')? + i;
                let inner: String = chars[i + 1..close].iter().collect();
                compound.attributes.push(parse_attribute_test(&inner)?);
                i = close + 1;
            }
            ':' => {
                let mut j = i;
                while j < chars.len() && chars[j] == ':' {
                    j += 1;
                }
                let (_, mut next) = read_ident(chars, j);
                if next < chars.len() && chars[next] == '(' {
                    next = chars[next..].iter().position(|&c| c == ')')? + next + 1;
                }
                compound.pseudo += 1;
                i = next;
            }
            c if is_ident(c) && i == start => {
                let (ident, next) = read_ident(chars, i);
                compound.tag = Some(ident);
                i = next;
            }
            _ => break,
        }
    }

    (i > start).then_some((compound, i))
}

fn parse_attribute_test(inner: &str) -> Option<AttributeTest> {
    match inner.split_once('=') {
        None => {
            let name = inner.trim();
            (!name.is_empty()).then(|| AttributeTest::Present(name.to_string()))
        }
        Some((name, value)) => {
            let name = name.trim();
            // Only plain equality is supported.
            if name.is_empty() || name.ends_with(|c: char| matches!(c, '~' | '|' | '^' | '$' | '*')) {
                return None;
            }
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            Some(AttributeTest::Equals(name.to_string(), value.to_string()))
        }
    }
}

/// Whether `selector` matches `element` within its ancestor chain.
pub fn matches_selector(element: &Element, selector: &str) -> bool {
    match parse_selector(selector) {
        Some(parts) => matches_parts(element, &parts),
        None => false,
    }
}

fn matches_parts(element: &Element, parts: &[(Compound, Option<Combinator>)]) -> bool {
    let Some(((compound, _), rest)) = parts.split_last() else {
        return true;
    };
    if !compound.matches(element) {
        return false;
    }
    let Some((_, combinator)) = rest.last() else {
        return true;
    };

    match combinator {
        Some(Combinator::Child) => element
            .parent()
            .is_some_and(|parent| matches_parts(&parent, rest)),
        _ => {
            let mut ancestor = element.parent();
            while let Some(current) = ancestor {
                if matches_parts(&current, rest) {
                    return true;
                }
                ancestor = current.parent();
            }
            false
        }
    }
}

/// A rule: selector, its specificity and the declared properties in order.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selector: String,
    pub specificity: String,
    pub properties: Vec<(String, String)>,
}

/// A `@font-face` source in SVG format that should be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFaceRequest {
    pub family: String,
    pub url: String,
}

/// Rules by selector, kept in declaration order.
#[derive(Debug, Default)]
pub struct StyleRegistry {
    rules: Vec<StyleRule>,
    index: HashMap<String, usize>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    pub fn get(&self, selector: &str) -> Option<&StyleRule> {
        self.index.get(selector).map(|&i| &self.rules[i])
    }

    /// Add declarations for a selector, merging into an existing rule.
    pub fn add_rule(&mut self, selector: &str, properties: Vec<(String, String)>) {
        match self.index.get(selector) {
            Some(&i) => {
                let rule = &mut self.rules[i];
                for (name, value) in properties {
                    match rule.properties.iter_mut().find(|(n, _)| *n == name) {
                        Some(existing) => existing.1 = value,
                        None => rule.properties.push((name, value)),
                    }
                }
            }
            None => {
                self.index.insert(selector.to_string(), self.rules.len());
                self.rules.push(StyleRule {
                    selector: selector.to_string(),
                    specificity: selector_specificity(selector),
                    properties,
                });
            }
        }
    }

    /// Rules whose selector matches `element`, in declaration order.
    pub fn matching<'a>(&'a self, element: &'a Element) -> impl Iterator<Item = &'a StyleRule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| !rule.selector.starts_with('@') && matches_selector(element, &rule.selector))
    }

    /// Register the rules of a stylesheet and return the SVG fonts it asks for.
    pub fn parse_stylesheet(&mut self, css: &str) -> Vec<FontFaceRequest> {
        let css = compress_spaces(&strip_css_noise(css));
        let mut fonts = Vec::new();

        for block in css.split('}') {
            let block = block.trim();
            let Some((selectors, body)) = block.split_once('{') else {
                continue;
            };
            let properties: Vec<(String, String)> = body
                .split(';')
                .filter_map(|declaration| {
                    let (name, value) = declaration.split_once(':')?;
                    let (name, value) = (name.trim(), value.trim());
                    (!name.is_empty() && !value.is_empty())
                        .then(|| (name.to_string(), value.to_string()))
                })
                .collect();

            for selector in selectors.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                trace!(selector, count = properties.len(), "Adding style rule");
                self.add_rule(selector, properties.clone());
                if selector == "@font-face" {
                    fonts.extend(font_face_requests(&properties));
                }
            }
        }
        fonts
    }
}

fn font_face_requests(properties: &[(String, String)]) -> Vec<FontFaceRequest> {
    let get = |name: &str| {
        properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    };
    let (Some(family), Some(src)) = (get("font-family"), get("src")) else {
        return Vec::new();
    };
    let family = family.replace(['"', '\''], "");

    src.split(',')
        .filter(|source| source.contains("format(\"svg\")") || source.contains("format('svg')"))
        .filter_map(parse_external_url)
        .map(|url| {
            debug!(family = %family, url = %url, "SVG font requested");
            FontFaceRequest {
                family: family.clone(),
                url,
            }
        })
        .collect()
}

/// Remove comments, `//` lines and `@import` statements.
fn strip_css_noise(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);

    out.lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .map(|line| {
            let mut line = line.to_string();
            while let Some(start) = line.find("@import") {
                let end = line[start..].find(';').map_or(line.len(), |e| start + e + 1);
                line.replace_range(start..end, "");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
