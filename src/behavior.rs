//! Behavior Module for MobiLang Compiler
//!
//! Ordered instruction model of a screen script. Every instruction renders
//! back to script text; untouched instructions reproduce their source.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Behavior {
    pub instructions: Vec<Instruction>,
}

impl Behavior {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Rendered script, one entry per line.
    pub fn to_code(&self) -> Vec<String> {
        self.instructions
            .iter()
            .flat_map(|instruction| {
                instruction
                    .to_code()
                    .split('\n')
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Instruction {
    Declaration(Declaration),
    Declarator(Declarator),
    Literal(Literal),
    Template(TemplateLiteral),
    TemplateElement(TemplateElement),
    Assignment(Assignment),
    /// Any statement kept as raw source text.
    Expression(RawCode),
}

impl Instruction {
    pub fn raw(code: impl Into<String>) -> Self {
        Instruction::Expression(RawCode { code: code.into() })
    }

    pub fn to_code(&self) -> String {
        match self {
            Instruction::Declaration(declaration) => declaration.to_code(),
            Instruction::Declarator(declarator) => {
                format!("{} {};", declarator.qualifier, declarator.to_code())
            }
            Instruction::Literal(literal) => literal.raw.clone(),
            Instruction::Template(template) => template.to_code(),
            Instruction::TemplateElement(element) => element.value.clone(),
            Instruction::Assignment(assignment) => assignment.to_code(),
            Instruction::Expression(raw) => raw.code.clone(),
        }
    }
}

/// `let a = 1, b;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub kind: String,
    pub declarators: Vec<Declarator>,
}

impl Declaration {
    pub fn new(kind: &str, declarators: Vec<Declarator>) -> Self {
        Self {
            kind: kind.to_string(),
            declarators,
        }
    }

    pub fn to_code(&self) -> String {
        let declarators: Vec<String> = self.declarators.iter().map(Declarator::to_code).collect();
        format!("{} {};", self.kind, declarators.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declarator {
    /// Value category of the initializer, e.g. `string`, `number`, `template`, `expression`.
    pub kind: String,
    /// Binding keyword: `var`, `let` or `const`.
    pub qualifier: String,
    pub id: String,
    pub init: Option<Box<Instruction>>,
}

impl Declarator {
    pub fn new(kind: &str, qualifier: &str, id: &str, init: Option<Instruction>) -> Self {
        Self {
            kind: kind.to_string(),
            qualifier: qualifier.to_string(),
            id: id.to_string(),
            init: init.map(Box::new),
        }
    }

    pub fn to_code(&self) -> String {
        match &self.init {
            Some(init) => format!("{} = {}", self.id, init.to_code()),
            None => self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Literal {
    pub raw: String,
}

impl Literal {
    pub fn string(value: &str) -> Self {
        Self {
            raw: format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }

    pub fn number(value: f64) -> Self {
        Self {
            raw: value.to_string(),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            raw: value.to_string(),
        }
    }

    pub fn null() -> Self {
        Self {
            raw: "null".to_string(),
        }
    }

    pub fn from_raw(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }
}

/// One raw text piece of a template literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateElement {
    pub value: String,
    pub tail: bool,
}

/// `` `a${x}b` ``: quasis interleaved with expressions. There is always one more
/// quasi than expressions and only the last one is the tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateLiteral {
    pub quasis: Vec<TemplateElement>,
    pub expressions: Vec<String>,
}

impl TemplateLiteral {
    pub fn to_code(&self) -> String {
        let mut code = String::from("`");
        for (index, quasi) in self.quasis.iter().enumerate() {
            code.push_str(&quasi.value);
            if let Some(expression) = self.expressions.get(index) {
                code.push_str("${");
                code.push_str(expression);
                code.push('}');
            }
        }
        code.push('`');
        code
    }
}

/// `target op value;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub target: String,
    pub operator: String,
    pub value: String,
}

impl Assignment {
    pub fn to_code(&self) -> String {
        format!("{} {} {};", self.target, self.operator, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCode {
    pub code: String,
}
