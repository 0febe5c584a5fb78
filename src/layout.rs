use crate::{
    document::{DocumentModel, FieldKind, FieldValue, CUSTOM_SUFFIX, OTHER_OPTION},
    signature::{MarkKind, SignatureImage},
};

/// What a node of the layout tree displays.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// The root of one page.
    Section { id: String },
    Heading { text: String },
    Paragraph { text: String },
    Label { text: String },
    Input { value: String, placeholder: String },
    Checkbox { checked: bool, label: String },
    SignatureBox {
        image: SignatureImage,
        mark: MarkKind,
        placeholder: String,
    },
}

/// The presentation of a node, in logical pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStyle {
    pub font_size: f32,
    pub bold: bool,
    pub centered: bool,
    pub underline: bool,
    pub border_bottom: bool,
    pub focus_ring: bool,
    pub min_height: f32,
    pub margin_bottom: f32,
}

impl Default for NodeStyle {
    fn default() -> Self {
        NodeStyle {
            font_size: 14.0,
            bold: false,
            centered: false,
            underline: false,
            border_bottom: false,
            focus_ring: false,
            min_height: 0.0,
            margin_bottom: 8.0,
        }
    }
}

/// A node of the tree describing how one page section looks on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub element: Element,
    pub style: NodeStyle,
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    pub fn new(element: Element, style: NodeStyle) -> Self {
        LayoutNode {
            element,
            style,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<LayoutNode>) -> Self {
        self.children = children;
        self
    }

    /// Strips the on-screen form chrome so that the page reads like paper: no underlines,
    /// bottom borders, focus rings or placeholders, and inputs at least `minimum_input_height`
    /// high so that their text is never clipped.
    pub fn normalize_for_print(&mut self, minimum_input_height: f32) {
        self.style.underline = false;
        self.style.border_bottom = false;
        self.style.focus_ring = false;
        match &mut self.element {
            Element::Input { placeholder, .. } => {
                placeholder.clear();
                self.style.min_height = self.style.min_height.max(minimum_input_height);
            }
            Element::SignatureBox { placeholder, .. } => placeholder.clear(),
            _ => {}
        }

        for child in self.children.iter_mut() {
            child.normalize_for_print(minimum_input_height);
        }
    }

    /// Visits the node and all its descendants, depth first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a LayoutNode)) {
        visit(self);
        for child in self.children.iter() {
            child.walk(visit);
        }
    }
}

/// Anything able to produce the live layout of the page sections of a document.
pub trait LayoutSource {
    /// The layout of the section, `None` when the section is not mounted.
    fn section_layout(&self, section_id: &str) -> Option<LayoutNode>;
}

impl LayoutSource for DocumentModel {
    fn section_layout(&self, section_id: &str) -> Option<LayoutNode> {
        let section = self
            .descriptor()
            .sections
            .iter()
            .find(|section| section.id == section_id)?;

        let mut children = vec![LayoutNode::new(
            Element::Heading {
                text: section.title.clone(),
            },
            NodeStyle {
                font_size: 22.0,
                bold: true,
                centered: true,
                margin_bottom: 16.0,
                ..NodeStyle::default()
            },
        )];
        for paragraph in section.paragraphs.iter() {
            children.push(paragraph_node(paragraph));
        }
        for field_name in section.fields.iter() {
            children.extend(self.field_nodes(field_name));
        }

        Some(
            LayoutNode::new(
                Element::Section {
                    id: section.id.clone(),
                },
                NodeStyle {
                    margin_bottom: 0.0,
                    ..NodeStyle::default()
                },
            )
            .with_children(children),
        )
    }
}

/// Upper-case paragraphs are the underlined sub-headings of the paper forms.
fn paragraph_node(text: &str) -> LayoutNode {
    let is_sub_heading = text.chars().any(char::is_alphabetic)
        && !text.chars().any(char::is_lowercase);
    if is_sub_heading {
        LayoutNode::new(
            Element::Heading {
                text: text.to_string(),
            },
            NodeStyle {
                font_size: 16.0,
                bold: true,
                underline: true,
                margin_bottom: 10.0,
                ..NodeStyle::default()
            },
        )
    } else {
        LayoutNode::new(
            Element::Paragraph {
                text: text.to_string(),
            },
            NodeStyle::default(),
        )
    }
}

fn label_node(text: &str) -> LayoutNode {
    LayoutNode::new(
        Element::Label {
            text: text.to_string(),
        },
        NodeStyle {
            font_size: 13.0,
            bold: true,
            margin_bottom: 2.0,
            ..NodeStyle::default()
        },
    )
}

impl DocumentModel {
    /// The nodes showing one field, empty for the override of a select field whose choice
    /// is not `"Other"`.
    fn field_nodes(&self, field_name: &str) -> Vec<LayoutNode> {
        if let Some(select_name) = field_name.strip_suffix(CUSTOM_SUFFIX) {
            let chosen = self
                .field(select_name)
                .ok()
                .and_then(FieldValue::as_text)
                .map(str::to_string);
            if chosen.is_some_and(|choice| choice != OTHER_OPTION) {
                return Vec::new();
            }
        }

        let (Ok(spec), Ok(value)) = (self.field_spec(field_name), self.field(field_name)) else {
            log::warn!("The section refers to the unknown field {:?}", field_name);
            return Vec::new();
        };

        match (&spec.kind, value) {
            (FieldKind::Checkbox, FieldValue::Checkbox(checked)) => vec![LayoutNode::new(
                Element::Checkbox {
                    checked: *checked,
                    label: spec.label.clone(),
                },
                NodeStyle::default(),
            )],
            (FieldKind::Signature { mark }, FieldValue::Signature(image)) => {
                let placeholder = match mark {
                    MarkKind::Signature => "Click to sign",
                    MarkKind::Initials => "Click to initial",
                };
                vec![
                    label_node(&spec.label),
                    LayoutNode::new(
                        Element::SignatureBox {
                            image: image.clone(),
                            mark: *mark,
                            placeholder: placeholder.to_string(),
                        },
                        NodeStyle {
                            border_bottom: true,
                            min_height: match mark {
                                MarkKind::Signature => 64.0,
                                MarkKind::Initials => 40.0,
                            },
                            margin_bottom: 12.0,
                            ..NodeStyle::default()
                        },
                    ),
                ]
            }
            _ => {
                // A select shows the raw choice, its override has its own input
                let shown_value = value.as_text().unwrap_or_default().to_string();
                let placeholder = match spec.kind {
                    FieldKind::Date => "MM/DD/YYYY",
                    FieldKind::Select { .. } => "Select...",
                    _ => "",
                };
                vec![
                    label_node(&spec.label),
                    LayoutNode::new(
                        Element::Input {
                            value: shown_value,
                            placeholder: placeholder.to_string(),
                        },
                        NodeStyle {
                            border_bottom: true,
                            min_height: 22.0,
                            margin_bottom: 10.0,
                            ..NodeStyle::default()
                        },
                    ),
                ]
            }
        }
    }
}
