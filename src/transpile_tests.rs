//! DOM-to-State Transpiler Tests for MobiLang Compiler
//!
//! Uses a converter that tags nested markup verbatim, so the expected state body
//! shows exactly which markup reached the target framework.

#[cfg(test)]
mod tests {
    use crate::errors::CoderError;
    use crate::markup::parse_markup;
    use crate::script::parse_script;
    use crate::tag::{AttributeEdit, TagId, TagTree};
    use crate::transpile::{DomStateTranspiler, NodeConverter, StateVariable, TranspilerOptions};
    use crate::CoderResult;
    use pretty_assertions::assert_eq;

    struct EchoConverter;

    impl NodeConverter for EchoConverter {
        fn convert_markup(&self, markup: &str) -> CoderResult<String> {
            Ok(format!("node({})", markup))
        }

        fn convert_children(&self, tree: &TagTree, id: TagId) -> CoderResult<String> {
            Ok(tree
                .children(id)
                .iter()
                .map(|child| format!("node({})", tree[*child].name))
                .collect::<Vec<_>>()
                .join(", "))
        }
    }

    fn structure() -> TagTree {
        parse_markup(
            r#"<div id="app"><ul id="foo"><li>a</li></ul><p id="msg">hi</p><span id="todo-list"></span></div>"#,
        )
        .unwrap()
    }

    fn lines(source: &[&str]) -> Vec<String> {
        source.iter().map(|line| line.to_string()).collect()
    }

    fn count(body: &[String], needle: &str) -> usize {
        body.iter().filter(|line| line.contains(needle)).count()
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CONTENT REPLACEMENT
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_inner_html_assignment_becomes_state() {
        let tree = structure();
        let behavior = parse_script(r#"document.getElementById("foo").innerHTML = "<b>hi</b>";"#).unwrap();
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile(&behavior)
            .unwrap();

        assert_eq!(
            result.state_declarations,
            vec![StateVariable {
                name: "foo".into(),
                tag_id: "foo".into(),
                initial_value: "[]".into(),
                binds_content: true,
            }]
        );
        assert_eq!(
            result.state_body,
            vec!["let _foo = [node(li)];", "_foo = [node(<b>hi</b>)];", "setfoo(_foo);"]
        );
        assert!(result.attribute_edits.is_empty());
    }

    #[test]
    fn test_repeated_idioms_declare_once() {
        let tree = structure();
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile_lines(&lines(&[
                r#"const list = document.getElementById("foo");"#,
                r#"list.innerHTML = "";"#,
                r#"list.innerHTML += "<li>" + item + "</li>";"#,
                r#"document.getElementById("foo").innerHTML += "<li>x</li>";"#,
            ]))
            .unwrap();

        assert_eq!(result.state_declarations.len(), 1);
        assert!(result.state_declarations[0].binds_content);
        assert_eq!(
            result.state_body,
            vec![
                "let _foo = [node(li)];",
                "_foo = [];",
                "_foo.push(node(<li>{item}</li>));",
                "_foo.push(node(<li>x</li>));",
                "setfoo(_foo);",
            ]
        );
        assert_eq!(count(&result.state_body, "let _foo"), 1);
        assert_eq!(count(&result.state_body, "setfoo(_foo);"), 1);
    }

    #[test]
    fn test_non_literal_values_are_kept_as_expressions() {
        let tree = structure();
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile_lines(&lines(&[
                r#"document.getElementById("todo-list").innerHTML = items.map(render);"#,
            ]))
            .unwrap();

        assert_eq!(result.state_declarations[0].name, "todo_list");
        assert_eq!(
            result.state_body,
            vec![
                "let _todo_list = [];",
                "_todo_list = [items.map(render)];",
                "settodo_list(_todo_list);",
            ]
        );
    }

    #[test]
    fn test_setters_follow_registration_order() {
        let tree = structure();
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile_lines(&lines(&[
                r#"const message = document.getElementById("msg");"#,
                r#"document.getElementById("foo").innerHTML = "<i>x</i>";"#,
            ]))
            .unwrap();

        let names: Vec<&str> = result
            .state_declarations
            .iter()
            .map(|state| state.name.as_str())
            .collect();
        assert_eq!(names, vec!["msg", "foo"]);
        assert_eq!(
            result.state_body,
            vec![
                "let _foo = [node(li)];",
                "_foo = [node(<i>x</i>)];",
                "let _msg = [];",
                "setmsg(_msg);",
                "setfoo(_foo);",
            ]
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // LOOKUPS AND ATTRIBUTE EDITS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_lookup_mutation_becomes_attribute_edit() {
        let tree = structure();
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile_lines(&lines(&[r#"document.getElementById("msg").className = "error";"#]))
            .unwrap();

        assert_eq!(
            result.attribute_edits,
            vec![AttributeEdit {
                tag_id: "msg".into(),
                attribute: "class".into(),
                value: "error".into(),
            }]
        );
        assert!(result.state_body.is_empty());
        assert!(result.state_declarations.is_empty());
    }

    #[test]
    fn test_bound_variable_mutation_becomes_attribute_edit() {
        let tree = structure();
        let mut transpiler = DomStateTranspiler::new(&tree, &EchoConverter);
        let result = transpiler
            .transpile_lines(&lines(&[
                r#"const m = document.getElementById("msg");"#,
                "m.hidden = true;",
                "let count = 0;",
                "count.value = 3;",
            ]))
            .unwrap();

        assert_eq!(
            result.attribute_edits,
            vec![AttributeEdit {
                tag_id: "msg".into(),
                attribute: "hidden".into(),
                value: "true".into(),
            }]
        );
        assert_eq!(
            result.state_body,
            vec!["let count = 0;", "count.value = 3;", "let _msg = [];", "setmsg(_msg);"]
        );
        assert_eq!(transpiler.symbol_table().get("m").map(String::as_str), Some("msg"));
        assert_eq!(transpiler.symbol_table().get("count").map(String::as_str), Some("count"));
    }

    #[test]
    fn test_plain_object_named_like_an_element_is_not_bound() {
        let tree = structure();
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile_lines(&lines(&[
                r#"const el = document.getElementById("msg");"#,
                "const msg = {};",
                r#"msg.text = "bob";"#,
            ]))
            .unwrap();

        assert!(result.attribute_edits.is_empty());
        assert_eq!(
            result.state_body,
            vec![
                "const msg = {};",
                r#"msg.text = "bob";"#,
                "let _msg = [];",
                "setmsg(_msg);",
            ]
        );
    }

    #[test]
    fn test_redeclared_lookup_variable_loses_its_binding() {
        let tree = structure();
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile_lines(&lines(&[
                r#"let el = document.getElementById("msg");"#,
                "el = null;",
                "var el = { hidden: false };",
                "el.hidden = true;",
            ]))
            .unwrap();

        assert!(result.attribute_edits.is_empty());
        assert!(result.state_body.contains(&"el.hidden = true;".to_string()));
    }

    #[test]
    fn test_multi_line_handler_assignment_stays_in_body() {
        let tree = structure();
        let source = lines(&[
            r#"document.getElementById("msg").onclick = function () {"#,
            r#"    alert("hi");"#,
            "};",
        ]);
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile_lines(&source)
            .unwrap();

        assert!(result.attribute_edits.is_empty());
        assert_eq!(result.state_body, source);
    }

    #[test]
    fn test_single_line_handler_assignment_becomes_edit() {
        let tree = structure();
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile_lines(&lines(&[
                r#"const m = document.getElementById("msg");"#,
                "m.onclick = () => { go(); };",
            ]))
            .unwrap();

        assert_eq!(
            result.attribute_edits,
            vec![AttributeEdit {
                tag_id: "msg".into(),
                attribute: "onclick".into(),
                value: "() => { go(); }".into(),
            }]
        );
    }

    #[test]
    fn test_missing_nodes_fail_fast() {
        let tree = structure();
        let mut transpiler = DomStateTranspiler::new(&tree, &EchoConverter);

        let err = transpiler
            .transpile_lines(&lines(&[r#"document.getElementById("ghost").innerHTML = "<b>x</b>";"#]))
            .unwrap_err();
        assert_eq!(err, CoderError::NodeNotFound { id: "ghost".into() });

        let err = transpiler
            .transpile_lines(&lines(&[r#"document.getElementById("ghost").src = "a.png";"#]))
            .unwrap_err();
        assert_eq!(err, CoderError::NodeNotFound { id: "ghost".into() });

        let err = transpiler
            .transpile_lines(&lines(&[r#"unknown.innerHTML = "<b>x</b>";"#]))
            .unwrap_err();
        assert_eq!(err, CoderError::NodeNotFound { id: "unknown".into() });
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // NAVIGATION AND PASSTHROUGH
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_location_is_rewritten() {
        let tree = structure();
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile_lines(&lines(&[
                r#"window.location.href = "mobilang:screen:home";"#,
                "let query = window.location.href;",
            ]))
            .unwrap();

        assert_eq!(
            result.state_body,
            vec![
                r#"props.navigation.navigate("mobilang:screen:home");"#,
                "let query = props.route.params.query;",
            ]
        );
    }

    #[test]
    fn test_location_reads_only_without_navigation_call() {
        let tree = structure();
        let options = TranspilerOptions {
            location_read: "route.query".into(),
            navigation_call: None,
        };
        let result = DomStateTranspiler::with_options(&tree, &EchoConverter, options)
            .transpile_lines(&lines(&["let here = window.location.href;"]))
            .unwrap();
        assert_eq!(result.state_body, vec!["let here = route.query;"]);
    }

    #[test]
    fn test_plain_script_passes_through() {
        let tree = structure();
        let source = lines(&["function greet(name) {", "  console.log(name);", "", "}"]);
        let result = DomStateTranspiler::new(&tree, &EchoConverter)
            .transpile_lines(&source)
            .unwrap();

        assert_eq!(
            result.state_body,
            vec!["function greet(name) {", "  console.log(name);", "}"]
        );
        assert!(result.state_declarations.is_empty());
    }
}
