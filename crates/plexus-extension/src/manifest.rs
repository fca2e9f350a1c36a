//! Plugin manifest (`*.pluginspec`) parsing and emission
//!
//! A manifest is a small XML document:
//!
//! ```xml
//! <plugin name="Flight" version="1.0.0" compatVersion="1.0.0">
//!     <vendor>dRonin</vendor>
//!     <description>Flight configuration</description>
//!     <module path="libflight.so"/>
//!     <dependencyList>
//!         <dependency name="Core" version="1.0.0"/>
//!     </dependencyList>
//!     <argumentList>
//!         <argument name="-nowizard">Skip the setup wizard</argument>
//!     </argumentList>
//! </plugin>
//! ```

use crate::error::{ExtensionError, Result};
use crate::version::PluginVersion;
use roxmltree::{Document, Node};
use std::fmt;
use std::path::Path;

const PLUGIN: &str = "plugin";
const PLUGIN_NAME: &str = "name";
const PLUGIN_VERSION: &str = "version";
const PLUGIN_COMPATVERSION: &str = "compatVersion";
const VENDOR: &str = "vendor";
const COPYRIGHT: &str = "copyright";
const LICENSE: &str = "license";
const DESCRIPTION: &str = "description";
const URL: &str = "url";
const MODULE: &str = "module";
const MODULE_PATH: &str = "path";
const DEPENDENCYLIST: &str = "dependencyList";
const DEPENDENCY: &str = "dependency";
const DEPENDENCY_NAME: &str = "name";
const DEPENDENCY_VERSION: &str = "version";
const ARGUMENTLIST: &str = "argumentList";
const ARGUMENT: &str = "argument";
const ARGUMENT_NAME: &str = "name";
const ARGUMENT_PARAMETER: &str = "parameter";

/// A declared dependency on another plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDependency {
    /// Name of the required plugin
    pub name: String,
    /// Version the dependent was built against
    pub version: PluginVersion,
}

impl PluginDependency {
    /// Create a new dependency
    pub fn new(name: impl Into<String>, version: PluginVersion) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// A command-line argument a plugin declares in its manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginArgumentDescription {
    /// Option name, e.g. `-nowizard`
    pub name: String,
    /// Parameter placeholder shown in help output
    pub parameter: Option<String>,
    /// Help text
    pub description: String,
}

/// Declarative content of one manifest file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Unique plugin name
    pub name: String,
    /// Plugin version
    pub version: PluginVersion,
    /// Oldest version dependents may still request
    pub compat_version: PluginVersion,
    /// Vendor (informational)
    pub vendor: String,
    /// Copyright (informational)
    pub copyright: String,
    /// License (informational)
    pub license: String,
    /// Description (informational)
    pub description: String,
    /// Homepage (informational)
    pub url: String,
    /// Module path relative to the manifest, if not the default library name
    pub module: Option<String>,
    /// Declared dependencies, in manifest order
    pub dependencies: Vec<PluginDependency>,
    /// Declared command-line arguments
    pub arguments: Vec<PluginArgumentDescription>,
}

impl Manifest {
    /// Create a manifest with no metadata and no dependencies
    pub fn new(name: impl Into<String>, version: PluginVersion) -> Self {
        Self {
            name: name.into(),
            compat_version: version.clone(),
            version,
            vendor: String::new(),
            copyright: String::new(),
            license: String::new(),
            description: String::new(),
            url: String::new(),
            module: None,
            dependencies: Vec::new(),
            arguments: Vec::new(),
        }
    }

    /// Read and parse a manifest file
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ExtensionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&path.display().to_string(), &content)
    }

    /// Parse manifest text; `file` is only used in error messages
    pub fn parse(file: &str, content: &str) -> Result<Self> {
        let doc = Document::parse(content).map_err(|e| {
            let pos = match e {
                roxmltree::Error::UnclosedRootNode => end_position(content),
                _ => e.pos(),
            };
            let message = e.to_string();
            let message = message
                .strip_suffix(&format!(" at {pos}"))
                .map(str::to_string)
                .unwrap_or(message);
            ExtensionError::Parse {
                file: file.to_string(),
                line: pos.row,
                column: pos.col,
                message,
            }
        })?;

        ManifestReader { file, doc: &doc }.read_plugin(doc.root_element())
    }

    /// Emit the manifest as XML
    pub fn to_xml(&self) -> String {
        ManifestXml(self).to_string()
    }
}

/// Position just past the last character of `content`
fn end_position(content: &str) -> roxmltree::TextPos {
    let last_line = content.rsplit('\n').next().unwrap_or("");
    let row = content.matches('\n').count() + 1;
    let col = last_line.chars().count() + 1;
    roxmltree::TextPos::new(row as u32, col as u32)
}

struct ManifestReader<'a, 'input> {
    file: &'a str,
    doc: &'a Document<'input>,
}

impl<'a, 'input> ManifestReader<'a, 'input> {
    fn read_plugin(&self, root: Node<'a, 'input>) -> Result<Manifest> {
        if root.tag_name().name() != PLUGIN {
            return Err(ExtensionError::UnexpectedRootElement(PLUGIN.to_string()));
        }

        let name = required_attribute(root, PLUGIN_NAME)?;
        let version = version_attribute(root, PLUGIN_VERSION)?;
        let compat_version = match root.attribute(PLUGIN_COMPATVERSION) {
            Some(text) => parse_version(text, PLUGIN_COMPATVERSION)?,
            None => version.clone(),
        };

        let mut manifest = Manifest::new(name, version);
        manifest.compat_version = compat_version;

        for child in self.elements(root)? {
            match child.tag_name().name() {
                VENDOR => manifest.vendor = self.element_text(child)?,
                COPYRIGHT => manifest.copyright = self.element_text(child)?,
                LICENSE => manifest.license = self.element_text(child)?,
                DESCRIPTION => manifest.description = self.element_text(child)?,
                URL => manifest.url = self.element_text(child)?,
                MODULE => {
                    manifest.module = Some(required_attribute(child, MODULE_PATH)?.to_string());
                }
                DEPENDENCYLIST => manifest.dependencies = self.read_dependencies(child)?,
                ARGUMENTLIST => manifest.arguments = self.read_arguments(child)?,
                other => return Err(self.invalid_element(child, other)),
            }
        }

        Ok(manifest)
    }

    fn read_dependencies(&self, list: Node<'a, 'input>) -> Result<Vec<PluginDependency>> {
        self.elements(list)?
            .into_iter()
            .map(|child| {
                if child.tag_name().name() != DEPENDENCY {
                    return Err(self.invalid_element(child, child.tag_name().name()));
                }
                let name = required_attribute(child, DEPENDENCY_NAME)?;
                let version = version_attribute(child, DEPENDENCY_VERSION)?;
                self.elements(child)?
                    .first()
                    .map_or(Ok(()), |n| Err(self.invalid_element(*n, n.tag_name().name())))?;
                Ok(PluginDependency::new(name, version))
            })
            .collect()
    }

    fn read_arguments(&self, list: Node<'a, 'input>) -> Result<Vec<PluginArgumentDescription>> {
        self.elements(list)?
            .into_iter()
            .map(|child| {
                if child.tag_name().name() != ARGUMENT {
                    return Err(self.invalid_element(child, child.tag_name().name()));
                }
                Ok(PluginArgumentDescription {
                    name: required_attribute(child, ARGUMENT_NAME)?.to_string(),
                    parameter: child.attribute(ARGUMENT_PARAMETER).map(str::to_string),
                    description: self.element_text(child)?,
                })
            })
            .collect()
    }

    /// Child elements of `node`, rejecting stray non-whitespace text
    fn elements(&self, node: Node<'a, 'input>) -> Result<Vec<Node<'a, 'input>>> {
        let mut elements = Vec::new();
        for child in node.children() {
            if child.is_element() {
                elements.push(child);
            } else if child.is_text() && !child.text().unwrap_or("").trim().is_empty() {
                let text = child.text().unwrap_or("");
                let leading = text.len() - text.trim_start().len();
                let pos = self.doc.text_pos_at(child.range().start + leading);
                return Err(ExtensionError::UnexpectedToken {
                    file: self.file.to_string(),
                    line: pos.row,
                    column: pos.col,
                });
            }
        }
        Ok(elements)
    }

    /// Text content of a leaf element
    fn element_text(&self, node: Node<'a, 'input>) -> Result<String> {
        let mut text = String::new();
        for child in node.children() {
            if child.is_element() {
                return Err(self.invalid_element(child, child.tag_name().name()));
            }
            if child.is_text() {
                text.push_str(child.text().unwrap_or(""));
            }
        }
        Ok(text)
    }

    fn invalid_element(&self, node: Node<'a, 'input>, element: &str) -> ExtensionError {
        let pos = self.doc.text_pos_at(node.range().start);
        ExtensionError::InvalidElement {
            file: self.file.to_string(),
            line: pos.row,
            column: pos.col,
            element: element.to_string(),
        }
    }
}

fn required_attribute<'a>(node: Node<'a, '_>, attribute: &str) -> Result<&'a str> {
    node.attribute(attribute)
        .ok_or_else(|| ExtensionError::MissingAttribute {
            element: node.tag_name().name().to_string(),
            attribute: attribute.to_string(),
        })
}

fn version_attribute(node: Node<'_, '_>, attribute: &str) -> Result<PluginVersion> {
    parse_version(required_attribute(node, attribute)?, attribute)
}

fn parse_version(text: &str, attribute: &str) -> Result<PluginVersion> {
    PluginVersion::parse(text).ok_or_else(|| ExtensionError::InvalidFormat(attribute.to_string()))
}

struct ManifestXml<'a>(&'a Manifest);

impl fmt::Display for ManifestXml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        writeln!(
            f,
            "<{PLUGIN} {PLUGIN_NAME}=\"{}\" {PLUGIN_VERSION}=\"{}\" {PLUGIN_COMPATVERSION}=\"{}\">",
            Escaped(&m.name),
            Escaped(m.version.as_str()),
            Escaped(m.compat_version.as_str()),
        )?;
        for (tag, text) in [
            (VENDOR, &m.vendor),
            (COPYRIGHT, &m.copyright),
            (LICENSE, &m.license),
            (DESCRIPTION, &m.description),
            (URL, &m.url),
        ] {
            if !text.is_empty() {
                writeln!(f, "    <{tag}>{}</{tag}>", Escaped(text))?;
            }
        }
        if let Some(module) = &m.module {
            writeln!(f, "    <{MODULE} {MODULE_PATH}=\"{}\"/>", Escaped(module))?;
        }
        if !m.dependencies.is_empty() {
            writeln!(f, "    <{DEPENDENCYLIST}>")?;
            for dep in &m.dependencies {
                writeln!(
                    f,
                    "        <{DEPENDENCY} {DEPENDENCY_NAME}=\"{}\" {DEPENDENCY_VERSION}=\"{}\"/>",
                    Escaped(&dep.name),
                    Escaped(dep.version.as_str()),
                )?;
            }
            writeln!(f, "    </{DEPENDENCYLIST}>")?;
        }
        if !m.arguments.is_empty() {
            writeln!(f, "    <{ARGUMENTLIST}>")?;
            for arg in &m.arguments {
                write!(f, "        <{ARGUMENT} {ARGUMENT_NAME}=\"{}\"", Escaped(&arg.name))?;
                if let Some(parameter) = &arg.parameter {
                    write!(f, " {ARGUMENT_PARAMETER}=\"{}\"", Escaped(parameter))?;
                }
                writeln!(f, ">{}</{ARGUMENT}>", Escaped(&arg.description))?;
            }
            writeln!(f, "    </{ARGUMENTLIST}>")?;
        }
        writeln!(f, "</{PLUGIN}>")
    }
}

/// XML-escapes text and attribute values
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                c => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLIGHT: &str = r#"<plugin name="Flight" version="1.2.0" compatVersion="1.0.0">
    <vendor>dRonin</vendor>
    <license>GPL</license>
    <description>Flight configuration</description>
    <module path="libflight.so"/>
    <dependencyList>
        <dependency name="Core" version="1.0.0"/>
        <dependency name="UAVObjects" version="1.0"/>
    </dependencyList>
    <argumentList>
        <argument name="-nowizard" parameter="bool">Skip the setup wizard</argument>
    </argumentList>
</plugin>
"#;

    fn parse(content: &str) -> Result<Manifest> {
        Manifest::parse("test.pluginspec", content)
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest = parse(FLIGHT).unwrap();

        assert_eq!(manifest.name, "Flight");
        assert_eq!(manifest.version.as_str(), "1.2.0");
        assert_eq!(manifest.compat_version.as_str(), "1.0.0");
        assert_eq!(manifest.vendor, "dRonin");
        assert_eq!(manifest.license, "GPL");
        assert_eq!(manifest.module.as_deref(), Some("libflight.so"));
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.dependencies[1].name, "UAVObjects");
        assert_eq!(manifest.dependencies[1].version.as_str(), "1.0");
        assert_eq!(manifest.arguments[0].name, "-nowizard");
        assert_eq!(manifest.arguments[0].parameter.as_deref(), Some("bool"));
        assert_eq!(manifest.arguments[0].description, "Skip the setup wizard");
    }

    #[test]
    fn test_compat_version_defaults_to_version() {
        let manifest = parse(r#"<plugin name="Core" version="2.1"/>"#).unwrap();
        assert_eq!(manifest.compat_version.as_str(), "2.1");
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_wrong_root_element() {
        let err = parse(r#"<plugins name="Core" version="1.0"/>"#).unwrap_err();
        assert_eq!(err.to_string(), "Expected element 'plugin' as top level element");
    }

    #[test]
    fn test_missing_attributes() {
        let err = parse(r#"<plugin version="1.0"/>"#).unwrap_err();
        assert_eq!(err.to_string(), "'plugin' misses attribute 'name'");

        let err = parse(r#"<plugin name="Core"/>"#).unwrap_err();
        assert_eq!(err.to_string(), "'plugin' misses attribute 'version'");

        let err = parse(
            r#"<plugin name="A" version="1.0"><dependencyList><dependency name="B"/></dependencyList></plugin>"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "'dependency' misses attribute 'version'");
    }

    #[test]
    fn test_invalid_version_format() {
        let err = parse(r#"<plugin name="Core" version="1.x"/>"#).unwrap_err();
        assert_eq!(err.to_string(), "'version' has invalid format");

        let err = parse(r#"<plugin name="Core" version="1.0" compatVersion="one"/>"#).unwrap_err();
        assert_eq!(err.to_string(), "'compatVersion' has invalid format");
    }

    #[test]
    fn test_invalid_element_reports_position() {
        let err = parse("<plugin name=\"Core\" version=\"1.0\">\n    <bogus/>\n</plugin>").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error parsing file test.pluginspec: Invalid element 'bogus', at line 2, column 5"
        );
    }

    #[test]
    fn test_stray_token_reports_position() {
        let err = parse("<plugin name=\"Core\" version=\"1.0\">\n\n   stray\n</plugin>").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error parsing file test.pluginspec: Unexpected token, at line 3, column 4"
        );
    }

    #[test]
    fn test_unclosed_root_reports_end_of_input() {
        let err = parse("<plugin name=\"Cut\" version=\"1.0\">\n    <vendor>").unwrap_err();
        match err {
            ExtensionError::Parse { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 13);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mismatched_closing_tag() {
        let err = parse("<plugin name=\"Core\" version=\"1.0\">\n<vendor>x</license>\n</plugin>")
            .unwrap_err();
        match &err {
            ExtensionError::Parse { file, line, .. } => {
                assert_eq!(file, "test.pluginspec");
                assert_eq!(*line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("Error parsing file test.pluginspec: "));
    }

    #[test]
    fn test_emit_round_trip_is_byte_identical() {
        let first = parse(FLIGHT).unwrap();
        let emitted = first.to_xml();
        assert_eq!(emitted, FLIGHT);

        let second = parse(&emitted).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.to_xml(), emitted);
    }

    #[test]
    fn test_emit_escapes_markup() {
        let mut manifest = Manifest::new("Odd", PluginVersion::parse("1.0").unwrap());
        manifest.description = "a < b & \"c\"".to_string();

        let xml = manifest.to_xml();
        assert!(xml.contains("<description>a &lt; b &amp; &quot;c&quot;</description>"));
        assert_eq!(parse(&xml).unwrap().description, "a < b & \"c\"");
    }
}
