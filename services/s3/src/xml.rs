// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Single pass transcoder from S3 response XML to a generic tree.
//!
//! Only the subset of XML that S3 emits is understood: elements, text and
//! the five predefined entities plus numeric character references.
//! Attributes, declarations, comments and `<!...>` markup are skipped.
//! Nothing is validated and nothing fails; malformed input just yields a
//! shallower tree.
//!
//! XML cannot tell a one element list from a plain child, so callers name
//! the tags that always form arrays.
//!
//! ```
//! use s3sign_s3::xml::{transcode, XmlValue};
//! use std::collections::HashSet;
//!
//! let tree = transcode(
//!     "<Buckets><Bucket><Name>foo</Name></Bucket></Buckets>",
//!     &HashSet::from(["Bucket"]),
//! );
//! let buckets = tree.get("Buckets").and_then(XmlValue::as_array).unwrap();
//! assert_eq!(buckets[0].get("Name").and_then(XmlValue::as_str), Some("foo"));
//! ```

use std::collections::{HashMap, HashSet};

/// A node of a transcoded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlValue {
    /// Text content. Elements without text or children become `Text("")`.
    Text(String),
    /// Repeated elements named as array tags.
    Array(Vec<XmlValue>),
    /// Child elements by tag name. A repeated non-array tag keeps its last
    /// occurrence.
    Object(HashMap<String, XmlValue>),
}

impl Default for XmlValue {
    fn default() -> Self {
        XmlValue::Text(String::new())
    }
}

impl XmlValue {
    /// Returns the text if this node is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            XmlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the items if this node is an array.
    pub fn as_array(&self) -> Option<&[XmlValue]> {
        match self {
            XmlValue::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the fields if this node is an object.
    pub fn as_object(&self) -> Option<&HashMap<String, XmlValue>> {
        match self {
            XmlValue::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the named child of an object node.
    pub fn get(&self, key: &str) -> Option<&XmlValue> {
        self.as_object()?.get(key)
    }
}

impl Drop for XmlValue {
    fn drop(&mut self) {
        // Detach children onto a heap stack so that deep trees are freed
        // without recursion.
        let mut pending = Vec::new();
        detach_children(self, &mut pending);
        while let Some(mut node) = pending.pop() {
            detach_children(&mut node, &mut pending);
        }
    }
}

fn detach_children(node: &mut XmlValue, pending: &mut Vec<XmlValue>) {
    match node {
        XmlValue::Text(_) => {}
        XmlValue::Array(items) => pending.append(items),
        XmlValue::Object(fields) => pending.extend(fields.drain().map(|(_, v)| v)),
    }
}

/// Nodes nested deeper than this become `null` when converted to
/// [`serde_json::Value`], whose own drop and deserialization recurse.
pub const MAX_JSON_DEPTH: usize = 128;

impl From<XmlValue> for serde_json::Value {
    /// Convert iteratively. The document node is at depth 0 and anything
    /// below [`MAX_JSON_DEPTH`] is replaced by `null`.
    fn from(value: XmlValue) -> Self {
        enum Frame {
            Visit(XmlValue, usize),
            Array(usize),
            Object(Vec<String>),
        }

        let mut frames = vec![Frame::Visit(value, 0)];
        let mut done: Vec<serde_json::Value> = Vec::new();

        while let Some(frame) = frames.pop() {
            match frame {
                Frame::Visit(_, depth) if depth > MAX_JSON_DEPTH => {
                    done.push(serde_json::Value::Null)
                }
                Frame::Visit(mut node, depth) => match &mut node {
                    XmlValue::Text(v) => done.push(serde_json::Value::String(std::mem::take(v))),
                    XmlValue::Array(items) => {
                        let items = std::mem::take(items);
                        frames.push(Frame::Array(items.len()));
                        frames.extend(
                            items
                                .into_iter()
                                .rev()
                                .map(|v| Frame::Visit(v, depth + 1)),
                        );
                    }
                    XmlValue::Object(fields) => {
                        let (keys, values): (Vec<_>, Vec<_>) =
                            std::mem::take(fields).into_iter().unzip();
                        frames.push(Frame::Object(keys));
                        frames.extend(
                            values
                                .into_iter()
                                .rev()
                                .map(|v| Frame::Visit(v, depth + 1)),
                        );
                    }
                },
                Frame::Array(len) => {
                    let items = done.split_off(done.len() - len);
                    done.push(serde_json::Value::Array(items));
                }
                Frame::Object(keys) => {
                    let values = done.split_off(done.len() - keys.len());
                    done.push(serde_json::Value::Object(
                        keys.into_iter().zip(values).collect(),
                    ));
                }
            }
        }

        done.pop().unwrap_or(serde_json::Value::Null)
    }
}

/// Transcode `text` into a tree.
///
/// The returned value is an object holding the document element, for
/// example `{"ListAllMyBucketsResult": {...}}`. An input without any
/// element yields `Text("")`.
pub fn transcode(text: &str, array_tags: &HashSet<&str>) -> XmlValue {
    let mut parser = Transcoder::new(text, array_tags);
    parser.run();
    parser.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Start of input, a byte order mark may follow.
    Header,
    /// Prolog: whitespace, declarations and comments before the root.
    Document,
    /// Reading the name right after `<`.
    TagBegin,
    /// Inside an opening tag after its name, skipping attributes.
    Tag,
    /// Right after an opening tag: text here may become the value.
    TagBeginOrContent,
    /// Inside an element, between tags.
    Content,
    /// Reading the name of a closing tag.
    TagEnd,
    /// The root element has been closed.
    End,
}

#[derive(Debug)]
enum Slot {
    Empty,
    Text(String),
    Array(Vec<usize>),
    Object(HashMap<String, usize>),
}

struct Transcoder<'a> {
    text: &'a str,
    array_tags: &'a HashSet<&'a str>,

    state: State,
    pos: usize,

    /// Arena of nodes. A node always has a larger index than its parent.
    slots: Vec<Slot>,
    /// Open elements, innermost last. Index 0 is the document node.
    stack: Vec<usize>,

    /// Start of the text following the innermost opening tag, if nothing
    /// but text has been seen since.
    text_start: Option<usize>,
    /// Text waiting for the next tag to decide whether it is a value.
    pending_text: Option<(usize, usize)>,
    name_start: usize,
    quote: Option<u8>,
}

impl<'a> Transcoder<'a> {
    fn new(text: &'a str, array_tags: &'a HashSet<&'a str>) -> Self {
        Self {
            text,
            array_tags,

            state: State::Header,
            pos: 0,

            slots: vec![Slot::Empty],
            stack: vec![0],

            text_start: None,
            pending_text: None,
            name_start: 0,
            quote: None,
        }
    }

    fn run(&mut self) {
        let text = self.text;
        let bytes = text.as_bytes();

        while self.pos < bytes.len() {
            let c = bytes[self.pos];
            match self.state {
                State::Header => {
                    if self.text[self.pos..].starts_with('\u{feff}') {
                        self.pos += '\u{feff}'.len_utf8();
                        continue;
                    }
                    self.state = State::Document;
                    continue;
                }
                State::Document | State::Content => {
                    if c == b'<' {
                        if let Some(next) = self.skip_markup() {
                            // Markup splits text, so it can't be a value anymore.
                            self.text_start = None;
                            self.pos = next;
                            continue;
                        }
                        self.pending_text = self.text_start.take().map(|start| (start, self.pos));
                        self.name_start = self.pos + 1;
                        self.state = State::TagBegin;
                    }
                }
                State::TagBeginOrContent => {
                    self.text_start = Some(self.pos);
                    self.state = State::Content;
                    continue;
                }
                State::TagBegin => {
                    if c == b'/' && self.pos == self.name_start {
                        self.name_start = self.pos + 1;
                        self.state = State::TagEnd;
                    } else if c == b'>' || c == b'/' || c.is_ascii_whitespace() {
                        let name = &self.text[self.name_start..self.pos];
                        self.pending_text = None;
                        self.open(name);
                        self.state = State::Tag;
                        // Let the tag state see the terminator.
                        continue;
                    }
                }
                State::Tag => match (self.quote, c) {
                    (Some(q), c) if c == q => self.quote = None,
                    (Some(_), _) => {}
                    (None, b'"' | b'\'') => self.quote = Some(c),
                    (None, b'>') => {
                        if self.pos > 0 && bytes[self.pos - 1] == b'/' {
                            self.assign("");
                            self.close();
                        } else {
                            self.state = State::TagBeginOrContent;
                        }
                    }
                    _ => {}
                },
                State::TagEnd => {
                    if c == b'>' {
                        if let Some((start, end)) = self.pending_text.take() {
                            let value = decode_entities(&self.text[start..end]);
                            self.assign(&value);
                        }
                        self.close();
                    }
                }
                State::End => break,
            }
            self.pos += 1;
        }
    }

    /// Skip `<?...?>`, `<!--...-->` and `<!...>` at the current position.
    ///
    /// Returns the position after the markup, or `None` if an element tag
    /// starts here.
    fn skip_markup(&self) -> Option<usize> {
        let rest = &self.text[self.pos..];
        let (terminator, skip) = if rest.starts_with("<?") {
            ("?>", 2)
        } else if rest.starts_with("<!--") {
            ("-->", 4)
        } else if rest.starts_with("<!") {
            (">", 2)
        } else {
            return None;
        };

        Some(
            rest[skip..]
                .find(terminator)
                .map(|idx| self.pos + skip + idx + terminator.len())
                .unwrap_or(self.text.len()),
        )
    }

    fn top(&self) -> usize {
        self.stack.last().copied().unwrap_or(0)
    }

    fn alloc(&mut self, slot: Slot) -> usize {
        self.slots.push(slot);
        self.slots.len() - 1
    }

    fn open(&mut self, name: &str) {
        let parent = self.top();

        let child = if self.array_tags.contains(name) {
            let array = match &self.slots[parent] {
                Slot::Array(_) => parent,
                Slot::Object(fields) => {
                    let existing = fields
                        .get(name)
                        .copied()
                        .filter(|&field| matches!(self.slots[field], Slot::Array(_)));
                    match existing {
                        Some(field) => field,
                        None => {
                            let field = self.alloc(Slot::Array(Vec::new()));
                            if let Slot::Object(fields) = &mut self.slots[parent] {
                                fields.insert(name.to_string(), field);
                            }
                            field
                        }
                    }
                }
                Slot::Empty | Slot::Text(_) => {
                    self.slots[parent] = Slot::Array(Vec::new());
                    parent
                }
            };

            let child = self.alloc(Slot::Empty);
            if let Slot::Array(items) = &mut self.slots[array] {
                items.push(child);
            }
            child
        } else {
            if !matches!(self.slots[parent], Slot::Object(_)) {
                self.slots[parent] = Slot::Object(HashMap::new());
            }
            let child = self.alloc(Slot::Empty);
            if let Slot::Object(fields) = &mut self.slots[parent] {
                fields.insert(name.to_string(), child);
            }
            child
        };

        self.stack.push(child);
    }

    fn assign(&mut self, value: &str) {
        let top = self.top();
        if top != 0 {
            self.slots[top] = Slot::Text(value.to_string());
        }
    }

    fn close(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self.text_start = None;
        self.state = if self.stack.len() > 1 {
            State::Content
        } else {
            State::End
        };
    }

    /// Assemble the tree bottom up.
    fn finish(self) -> XmlValue {
        let mut built: Vec<Option<XmlValue>> = Vec::with_capacity(self.slots.len());
        built.resize_with(self.slots.len(), || None);

        for (idx, slot) in self.slots.into_iter().enumerate().rev() {
            let value = match slot {
                Slot::Empty => XmlValue::default(),
                Slot::Text(v) => XmlValue::Text(v),
                Slot::Array(items) => XmlValue::Array(
                    items
                        .into_iter()
                        .filter_map(|i| built[i].take())
                        .collect(),
                ),
                Slot::Object(fields) => XmlValue::Object(
                    fields
                        .into_iter()
                        .filter_map(|(k, i)| built[i].take().map(|v| (k, v)))
                        .collect(),
                ),
            };
            built[idx] = Some(value);
        }

        built
            .first_mut()
            .and_then(Option::take)
            .unwrap_or_default()
    }
}

/// Decode the predefined entities and numeric character references.
///
/// Anything that is not a known reference is kept as is.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];

        let decoded = rest.find(';').and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(|v| v.ok())
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
