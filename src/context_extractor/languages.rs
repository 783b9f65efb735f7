//! Per-language block-type sets: the syntax node kinds considered candidate
//! context units (spec.md §4.3 "Language dispatch", GLOSSARY "Block type").
//!
//! Grounded in `selvage/src/context_extractor/optimized_context_extractor.py`'s
//! `LANGUAGE_BLOCK_TYPES` table. Node kind names are the tree-sitter grammar's
//! own vocabulary for each language.

use std::collections::HashSet;

use tree_sitter::Language as TsLanguage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    Python,
    JavaScript,
    TypeScript,
    Java,
    C,
    Cpp,
    CSharp,
    Go,
}

impl SourceLanguage {
    /// Resolve from a file extension, the same granularity the orchestrator
    /// passes along as `UserPrompt.language`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Self::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "tsx" => Some(Self::TypeScript),
            "java" => Some(Self::Java),
            "c" | "h" => Some(Self::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some(Self::Cpp),
            "cs" => Some(Self::CSharp),
            "go" => Some(Self::Go),
            _ => None,
        }
    }

    pub fn ts_language(&self) -> TsLanguage {
        match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::C => tree_sitter_c::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Self::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }

    /// The root node kind to exclude when walking toward the ancestor chain
    /// (spec.md §4.3 step 3's "module/program" root node exclusion).
    pub fn root_node_kind(&self) -> &'static str {
        match self {
            Self::Python => "module",
            Self::JavaScript | Self::TypeScript => "program",
            Self::Java => "program",
            Self::C | Self::Cpp => "translation_unit",
            Self::CSharp => "compilation_unit",
            Self::Go => "source_file",
        }
    }

    /// Node kinds considered candidate context units for this language.
    pub fn block_types(&self) -> HashSet<&'static str> {
        let kinds: &[&str] = match self {
            Self::Python => &["function_definition", "class_definition", "decorated_definition"],
            Self::JavaScript => &[
                "function_declaration",
                "class_declaration",
                "method_definition",
                "arrow_function",
                "generator_function_declaration",
            ],
            Self::TypeScript => &[
                "function_declaration",
                "class_declaration",
                "method_definition",
                "arrow_function",
                "interface_declaration",
                "type_alias_declaration",
                "enum_declaration",
            ],
            Self::Java => &[
                "class_declaration",
                "interface_declaration",
                "enum_declaration",
                "method_declaration",
                "constructor_declaration",
            ],
            Self::C => &["function_definition", "struct_specifier", "enum_specifier", "union_specifier"],
            Self::Cpp => &[
                "function_definition",
                "class_specifier",
                "struct_specifier",
                "enum_specifier",
                "namespace_definition",
            ],
            Self::CSharp => &[
                "class_declaration",
                "interface_declaration",
                "struct_declaration",
                "enum_declaration",
                "method_declaration",
                "namespace_declaration",
            ],
            Self::Go => &["function_declaration", "method_declaration", "type_declaration"],
        };
        kinds.iter().copied().collect()
    }

    /// Node kinds whose starting line is treated as a "declaration line" for
    /// the declaration-only wrapper (spec.md §4.3 step 3, first bullet).
    pub fn declaration_kinds(&self) -> HashSet<&'static str> {
        let kinds: &[&str] = match self {
            Self::Python => &["function_definition", "class_definition"],
            Self::JavaScript | Self::TypeScript => {
                &["function_declaration", "class_declaration", "method_definition"]
            }
            Self::Java => &["class_declaration", "interface_declaration", "method_declaration"],
            Self::C => &["function_definition", "struct_specifier"],
            Self::Cpp => &["function_definition", "class_specifier", "struct_specifier"],
            Self::CSharp => &["class_declaration", "interface_declaration", "method_declaration"],
            Self::Go => &["function_declaration", "method_declaration"],
        };
        kinds.iter().copied().collect()
    }

    /// Node kinds treated as module-level identifiers/assignments
    /// (spec.md §4.3 step 3, second bullet).
    pub fn module_level_kinds(&self) -> HashSet<&'static str> {
        let kinds: &[&str] = match self {
            Self::Python => &["assignment", "expression_statement"],
            Self::JavaScript | Self::TypeScript => {
                &["lexical_declaration", "variable_declaration", "expression_statement"]
            }
            Self::Java => &["field_declaration"],
            Self::C | Self::Cpp => &["declaration"],
            Self::CSharp => &["field_declaration"],
            Self::Go => &["var_declaration", "const_declaration"],
        };
        kinds.iter().copied().collect()
    }
}
