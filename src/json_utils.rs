use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

/// Type of a JSON node found by the structure scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Object,
    Array,
}

/// Coordinates of a JSON structure within a larger text, including nested children.
#[derive(Debug, Clone)]
pub struct ObjCoords {
    pub start: usize,
    pub end: usize, // inclusive index of the closing bracket/brace
    pub kind: NodeType,
    pub children: Vec<ObjCoords>,
}

impl ObjCoords {
    pub fn new(start: usize, end: usize, kind: NodeType, children: Vec<ObjCoords>) -> Self {
        Self { start, end, kind, children }
    }

    fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end + 1]
    }
}

#[derive(Debug)]
struct Frame {
    start: usize,
    kind: NodeType,
    children: Vec<ObjCoords>,
}

/// Find all balanced JSON object/array structures in `text`. Coordinates are byte indices.
///
/// Brackets inside string literals are ignored; mismatched closers are dropped.
#[instrument(target = "concurso_quiz::json", skip(text), fields(text_len = text.len()))]
pub fn find_json_structures(text: &str) -> Vec<ObjCoords> {
    let mut results: Vec<ObjCoords> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match b {
                b'\\' => escape = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let closing = match b {
            b'"' => {
                in_string = true;
                continue;
            }
            b'{' => {
                stack.push(Frame { start: i, kind: NodeType::Object, children: Vec::new() });
                continue;
            }
            b'[' => {
                stack.push(Frame { start: i, kind: NodeType::Array, children: Vec::new() });
                continue;
            }
            b'}' => NodeType::Object,
            b']' => NodeType::Array,
            _ => continue,
        };

        if let Some(frame) = stack.pop() {
            if frame.kind != closing {
                continue;
            }
            let node = ObjCoords::new(frame.start, i, frame.kind, frame.children);
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => results.push(node),
            }
        }
    }

    debug!(target: "concurso_quiz::json", count = results.len(), "found root structures");
    results
}

/// Extract all occurrences of `T` from a model response.
///
/// Strategy (in order):
/// - If the entire string parses as `Vec<T>`, return it.
/// - Otherwise scan for JSON structures; at each node prefer `Vec<T>`, then `T`,
///   otherwise descend into its children. Results keep discovery order.
#[instrument(target = "concurso_quiz::json", skip(text), fields(text_len = text.len()))]
pub fn extract_all<T: DeserializeOwned>(text: &str) -> Vec<T> {
    if let Ok(v) = serde_json::from_str::<Vec<T>>(text) {
        return v;
    }

    fn collect_from_node<T: DeserializeOwned>(text: &str, node: &ObjCoords, out: &mut Vec<T>) {
        let s = node.slice(text);
        if let Ok(vs) = serde_json::from_str::<Vec<T>>(s) {
            out.extend(vs);
            return;
        }
        if let Ok(v) = serde_json::from_str::<T>(s) {
            out.push(v);
            return;
        }
        for child in &node.children {
            collect_from_node::<T>(text, child, out);
        }
    }

    let mut out: Vec<T> = Vec::new();
    for node in &find_json_structures(text) {
        collect_from_node::<T>(text, node, &mut out);
    }
    debug!(target: "concurso_quiz::json", items = out.len(), "extraction done");
    out
}
