//! Text rendering for property trees, call stacks and breakpoint summaries.

use percent_encoding::percent_decode_str;

use crate::breakpoint::{key_order, BreakpointStore};
use crate::property::{Property, PropertyMap};
use crate::protocol;
use crate::xml::Element;

/// Lazily render a property tree as tab-indented lines, one per node, without
/// trailing newlines.
pub fn render_tree(tree: &PropertyMap, indent: usize) -> Box<dyn Iterator<Item = String> + '_> {
    Box::new(
        tree.values()
            .flat_map(move |property| render_property(property, indent)),
    )
}

fn render_property(property: &Property, indent: usize) -> Box<dyn Iterator<Item = String> + '_> {
    let tabs = "\t".repeat(indent);

    if let Some(value) = property.value.as_deref().filter(|v| !v.is_empty()) {
        let value = value.replace("\r\n", "\n").replace('\n', " ");
        return Box::new(std::iter::once(format!(
            "{tabs}{} = ({}) {value}",
            property.fullname, property.kind
        )));
    }

    match &property.children {
        Some(children) => {
            let header = format!(
                "{tabs}{} = {}[{}]",
                property.fullname,
                property.kind,
                property.numchildren.as_deref().unwrap_or_default()
            );
            let marker = property
                .is_truncated()
                .then(|| format!("{tabs}\t..."));
            Box::new(
                std::iter::once(header)
                    .chain(render_tree(children, indent + 1))
                    .chain(marker),
            )
        }
        None => Box::new(std::iter::once(format!(
            "{tabs}{} = <{}>",
            property.fullname, property.kind
        ))),
    }
}

/// Render a property tree into a single newline-terminated block.
pub fn render_tree_text(tree: &PropertyMap) -> String {
    render_tree(tree, 0).fold(String::new(), |mut out, line| {
        out.push_str(&line);
        out.push('\n');
        out
    })
}

/// One frame of a `stack_get` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub level: String,
    pub kind: Option<String>,
    pub filename: String,
    pub lineno: String,
    pub location: String,
}

impl StackFrame {
    /// Read a `<stack>` element, defaulting missing attributes.
    pub fn from_element(element: &Element) -> Self {
        let get = |key: &str| element.attr(key).map(str::to_string);
        Self {
            level: get(protocol::STACK_LEVEL).unwrap_or_else(|| "0".into()),
            kind: get(protocol::STACK_TYPE),
            filename: element
                .attr(protocol::STACK_FILENAME)
                .map(url_decode)
                .unwrap_or_default(),
            lineno: get(protocol::STACK_LINENO).unwrap_or_else(|| "0".into()),
            location: get(protocol::STACK_WHERE).unwrap_or_else(|| "{unknown}".into()),
        }
    }

    /// `[level] filename.where:lineno`
    pub fn render(&self) -> String {
        format!(
            "[{}] {}.{}:{}",
            self.level, self.filename, self.location, self.lineno
        )
    }
}

/// Stack frames of a response, innermost first as sent by the engine.
pub fn stack_frames(response: &Element) -> Vec<StackFrame> {
    response
        .children_named(protocol::ELEMENT_STACK)
        .map(StackFrame::from_element)
        .collect()
}

/// Render the frames of a `stack_get` response, one line per frame.
pub fn render_stack(response: &Element) -> String {
    stack_frames(response)
        .iter()
        .map(|frame| frame.render() + "\n")
        .collect()
}

/// Render every file's breakpoints.
///
/// Files are listed by name, entries numeric keys first. Files without
/// entries are skipped.
pub fn render_breakpoint_summary(store: &BreakpointStore) -> String {
    let mut out = String::new();
    for (filename, entries) in store.files() {
        if entries.is_empty() {
            continue;
        }
        out.push_str(&format!("=> {filename}\n"));

        let mut sorted: Vec<_> = entries.iter().collect();
        sorted.sort_by(|(a, _), (b, _)| key_order(a).cmp(&key_order(b)));
        for (key, entry) in sorted {
            let flag = if entry.enabled { "|+|" } else { "|-|" };
            out.push_str(&format!("\t{flag} {key}"));
            if let Some(expression) = &entry.expression {
                out.push_str(&format!(" -- \"{expression}\""));
            }
            out.push('\n');
        }
    }
    out
}

/// Decode `%XX` escapes; invalid UTF-8 is replaced.
pub fn url_decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoint::BreakpointEntry;
    use crate::xml::parse_document;

    fn leaf(fullname: &str, kind: &str, value: Option<&str>) -> Property {
        Property {
            name: fullname.into(),
            fullname: fullname.into(),
            kind: kind.into(),
            value: value.map(str::to_string),
            numchildren: None,
            children: None,
        }
    }

    fn container(fullname: &str, numchildren: Option<&str>, children: Vec<Property>) -> Property {
        Property {
            name: fullname.into(),
            fullname: fullname.into(),
            kind: "array".into(),
            value: None,
            numchildren: numchildren.map(str::to_string),
            children: Some(
                children
                    .into_iter()
                    .map(|p| (p.fullname.clone(), p))
                    .collect(),
            ),
        }
    }

    fn tree(properties: Vec<Property>) -> PropertyMap {
        properties
            .into_iter()
            .map(|p| (p.fullname.clone(), p))
            .collect()
    }

    #[test]
    fn renders_scalars_and_collapses_newlines() {
        let t = tree(vec![
            leaf("$a", "int", Some("1")),
            leaf("$s", "string", Some("line one\r\nline two\nthree")),
        ]);
        let lines: Vec<String> = render_tree(&t, 0).collect();
        assert_eq!(
            lines,
            ["$a = (int) 1", "$s = (string) line one line two three"]
        );
    }

    #[test]
    fn renders_containers_with_indentation() {
        let t = tree(vec![container(
            "$arr",
            Some("2"),
            vec![
                leaf("$arr[0]", "int", Some("1")),
                container("$arr[1]", Some("0"), vec![]),
            ],
        )]);
        assert_eq!(
            render_tree_text(&t),
            "$arr = array[2]\n\t$arr[0] = (int) 1\n\t$arr[1] = array[0]\n"
        );
    }

    #[test]
    fn truncated_containers_get_ellipsis() {
        let t = tree(vec![container(
            "$big",
            Some("1000"),
            vec![leaf("$big[0]", "int", Some("0"))],
        )]);
        let lines: Vec<String> = render_tree(&t, 1).collect();
        assert_eq!(
            lines,
            ["\t$big = array[1000]", "\t\t$big[0] = (int) 0", "\t\t..."]
        );
    }

    #[test]
    fn unexpanded_nodes_show_type() {
        let t = tree(vec![
            leaf("$n", "null", None),
            leaf("$empty", "string", Some("")),
        ]);
        let lines: Vec<String> = render_tree(&t, 0).collect();
        assert_eq!(lines, ["$n = <null>", "$empty = <string>"]);
    }

    #[test]
    fn missing_count_with_children_is_truncated() {
        let t = tree(vec![container(
            "$o",
            None,
            vec![leaf("$o->a", "int", Some("1"))],
        )]);
        assert_eq!(
            render_tree_text(&t),
            "$o = array[]\n\t$o->a = (int) 1\n\t...\n"
        );
    }

    #[test]
    fn renders_stack_frames() {
        let xml = r#"<response command="stack_get" transaction_id="9">
            <stack where="{main}" level="0" type="file" filename="file:///var/www/my%20app/index.php" lineno="12"/>
            <stack level="1" type="file" filename="file:///var/www/lib.php"/>
            <property name="ignored"/>
        </response>"#;
        let root = parse_document(xml).unwrap();
        assert_eq!(
            render_stack(&root),
            "[0] file:///var/www/my app/index.php.{main}:12\n[1] file:///var/www/lib.php.{unknown}:0\n"
        );
        let frames = stack_frames(&root);
        assert_eq!(frames[0].kind.as_deref(), Some("file"));
    }

    #[test]
    fn empty_stack_renders_nothing() {
        assert_eq!(render_stack(&Element::new("response")), "");
    }

    #[test]
    fn breakpoint_summary_order_and_format() {
        let mut store = BreakpointStore::new();
        store.set("/b.php", "abc", BreakpointEntry::new());
        store.set("/b.php", 10, BreakpointEntry::new().enabled(false));
        store.set("/b.php", 2, BreakpointEntry::new().with_expression("$i > 3"));
        store.set("/a.php", 7, BreakpointEntry::new());

        assert_eq!(
            render_breakpoint_summary(&store),
            "=> /a.php\n\t|+| 7\n=> /b.php\n\t|+| 2 -- \"$i > 3\"\n\t|-| 10\n\t|+| abc\n"
        );
    }

    #[test]
    fn breakpoint_summary_of_empty_store() {
        assert_eq!(render_breakpoint_summary(&BreakpointStore::new()), "");
    }

    #[test]
    fn url_decode_handles_escapes() {
        assert_eq!(url_decode("a%20b%2Fc"), "a b/c");
        assert_eq!(url_decode("plain"), "plain");
    }
}
