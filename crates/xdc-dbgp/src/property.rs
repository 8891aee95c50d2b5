//! Property tree extraction.
//!
//! Turns the `<property>` elements of a `context_get`/`property_get`
//! response into a bounded [`PropertyMap`]. Properties that declare children
//! the document does not contain are expanded lazily through a
//! [`PropertyFetcher`], capped by the configured depth and children limits.

use std::future::Future;
use std::pin::Pin;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::error::DbgpError;
use crate::protocol;
use crate::xml::Element;

/// Value stored in place of anything that looks like a password.
pub const REDACTED_VALUE: &str = "******";

/// Default pattern for password-like property names.
pub const DEFAULT_PASSWORD_PATTERN: &str = "(?i)password";

/// Properties keyed by fully-qualified name.
pub type PropertyMap = IndexMap<String, Property>;

/// One variable reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Short name as reported by the engine.
    pub name: String,
    /// Fully-qualified name, the key in the parent map.
    pub fullname: String,
    /// Declared type, or the class name for objects.
    pub kind: String,
    /// Decoded value; `None` for containers and uninitialised values.
    pub value: Option<String>,
    /// Declared child count exactly as sent; may be missing or non-numeric.
    pub numchildren: Option<String>,
    /// `None` = not expanded, empty = expanded without children.
    pub children: Option<PropertyMap>,
}

impl Property {
    /// The declared child count, if it is a number.
    pub fn declared_children(&self) -> Option<usize> {
        self.numchildren
            .as_deref()
            .and_then(|n| n.trim().parse().ok())
    }

    /// Whether fewer children were fetched than the engine declared.
    pub fn is_truncated(&self) -> bool {
        let Some(children) = &self.children else {
            return false;
        };
        match self.declared_children() {
            Some(declared) => declared != children.len(),
            None => {
                let missing = self.numchildren.as_deref().map_or(true, str::is_empty);
                missing && !children.is_empty()
            }
        }
    }
}

/// Limits and filters applied while extracting.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Deepest level to expand, 0 being the top level. 0 = unlimited.
    pub max_depth: usize,
    /// Children requested per lazy expansion. 0 = unlimited.
    pub max_children: usize,
    /// Names matching this pattern have their value redacted.
    pub password_filter: Option<Regex>,
}

impl ExtractOptions {
    /// Options with the given limits and the default password filter.
    pub fn new(max_depth: usize, max_children: usize) -> Self {
        Self {
            max_depth,
            max_children,
            password_filter: Regex::new(DEFAULT_PASSWORD_PATTERN).ok(),
        }
    }

    /// Replace the password filter; `None` disables redaction.
    pub fn with_password_filter(mut self, filter: Option<Regex>) -> Self {
        self.password_filter = filter;
        self
    }

    fn exceeds_depth(&self, depth: usize) -> bool {
        self.max_depth != 0 && depth > self.max_depth
    }

    fn looks_like_password(&self, name: &str) -> bool {
        self.password_filter
            .as_ref()
            .is_some_and(|filter| filter.is_match(name))
    }

    /// Children to request for a property declaring `numchildren`.
    fn children_limit(&self, numchildren: Option<&str>) -> Option<usize> {
        let declared = numchildren.and_then(|n| n.trim().parse::<usize>().ok());
        match (declared, self.max_children) {
            (Some(n), 0) => Some(n),
            (Some(n), max) => Some(n.min(max)),
            (None, 0) => None,
            (None, max) => Some(max),
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new(1, 32)
    }
}

/// Source of `property_get` responses for lazy expansion.
#[allow(async_fn_in_trait)]
pub trait PropertyFetcher {
    /// Fetch the response document for `fullname`, asking the engine for at
    /// most `max_children` children when given.
    async fn fetch_property(
        &mut self,
        fullname: &str,
        max_children: Option<usize>,
    ) -> Result<Element, DbgpError>;
}

type ExtractFuture<'a> = Pin<Box<dyn Future<Output = Result<PropertyMap, DbgpError>> + 'a>>;

/// Extract the properties directly under `element`, which sits at `depth`.
pub async fn extract_properties<F: PropertyFetcher>(
    element: &Element,
    depth: usize,
    options: &ExtractOptions,
    fetcher: &mut F,
) -> Result<PropertyMap, DbgpError> {
    extract_level(element, depth, options, fetcher).await
}

fn extract_level<'a, F>(
    element: &'a Element,
    depth: usize,
    options: &'a ExtractOptions,
    fetcher: &'a mut F,
) -> ExtractFuture<'a>
where
    F: PropertyFetcher + 'a,
{
    Box::pin(async move {
        let mut properties = PropertyMap::new();
        if options.exceeds_depth(depth) {
            return Ok(properties);
        }

        for child in element.children_named(protocol::ELEMENT_PROPERTY) {
            let Some(mut property) = read_property(child, options) else {
                continue;
            };

            // Redacted nodes are never expanded.
            if declares_children(child) && !options.looks_like_password(&property.fullname) {
                let children = if options.exceeds_depth(depth + 1) {
                    PropertyMap::new()
                } else if has_inline_properties(child) {
                    extract_level(child, depth + 1, options, &mut *fetcher).await?
                } else {
                    let limit = options.children_limit(property.numchildren.as_deref());
                    debug!("expanding {} (limit {limit:?})", property.fullname);
                    let response = fetcher.fetch_property(&property.fullname, limit).await?;
                    match find_property_element(&response, &property.fullname) {
                        Some(found) => {
                            extract_level(found, depth + 1, options, &mut *fetcher).await?
                        }
                        None => PropertyMap::new(),
                    }
                };
                property.children = Some(children);
            }

            properties.insert(property.fullname.clone(), property);
        }
        Ok(properties)
    })
}

/// Build a [`Property`] from one element, or `None` when it must be skipped.
fn read_property(element: &Element, options: &ExtractOptions) -> Option<Property> {
    let fullname = element
        .attr(protocol::PROPERTY_FULLNAME)
        .filter(|n| !n.is_empty())?;

    if fullname == "::" {
        return None;
    }
    // Static members reference their own class; more than one `::` is a loop.
    if fullname.matches("::").count() > 1 {
        return None;
    }

    let declared_type = element.attr(protocol::PROPERTY_TYPE).unwrap_or_default();
    let kind = match element.attr(protocol::PROPERTY_CLASSNAME) {
        Some(class) if declared_type == "object" && !class.is_empty() => class,
        _ => declared_type,
    };

    let value = if options.looks_like_password(fullname) {
        Some(REDACTED_VALUE.to_string())
    } else {
        decode_value(element)
    };

    Some(Property {
        name: element
            .attr(protocol::PROPERTY_NAME)
            .unwrap_or(fullname)
            .to_string(),
        fullname: fullname.to_string(),
        kind: kind.to_string(),
        value,
        numchildren: element
            .attr(protocol::PROPERTY_NUMCHILDREN)
            .map(str::to_string),
        children: None,
    })
}

/// Element text, base64-decoded when the engine says so.
fn decode_value(element: &Element) -> Option<String> {
    let text = element.text.as_deref()?;
    match element.attr(protocol::PROPERTY_ENCODING) {
        Some("base64") => match STANDARD.decode(text.trim()) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(_) => Some(text.to_string()),
        },
        _ => Some(text.to_string()),
    }
}

fn declares_children(element: &Element) -> bool {
    matches!(
        element.attr(protocol::PROPERTY_CHILDREN).map(str::trim),
        Some("1") | Some("true")
    )
}

fn has_inline_properties(element: &Element) -> bool {
    element
        .children_named(protocol::ELEMENT_PROPERTY)
        .next()
        .is_some()
}

fn find_property_element<'a>(response: &'a Element, fullname: &str) -> Option<&'a Element> {
    response
        .children_named(protocol::ELEMENT_PROPERTY)
        .find(|p| p.attr(protocol::PROPERTY_FULLNAME) == Some(fullname))
}

/// Depth-first lookup of a property by fully-qualified name.
///
/// Each level is checked before descending into children maps.
pub fn find_variable<'a>(tree: &'a PropertyMap, name: &str) -> Option<&'a Property> {
    if let Some(found) = tree.get(name) {
        return Some(found);
    }
    tree.values()
        .filter_map(|p| p.children.as_ref())
        .find_map(|children| find_variable(children, name))
}
