//! Directive Resolution Tests for MobiLang Compiler
//!
//! Drives the directive engine with a recording hook set so the assertions only
//! depend on the engine's detection and splicing rules.

#[cfg(test)]
mod tests {
    use crate::directive::{DirectiveHooks, DirectiveParser};
    use pretty_assertions::assert_eq;

    struct RecordingHooks;

    impl DirectiveHooks for RecordingHooks {
        fn swap_screen_directive(&self, screen: &str) -> String {
            format!("{}Screen", screen)
        }

        fn swap_screen_directive_with_parameters(
            &self,
            screen: &str,
            parameters: &[(String, String)],
        ) -> String {
            let fields: Vec<String> = parameters
                .iter()
                .map(|(key, value)| format!("{}:{}", key, value))
                .collect();
            format!("navigate('{}', {{{}}})", screen, fields.join(", "))
        }

        fn swap_param_directive(&self, param: &str) -> String {
            format!("route.params.{}", param)
        }

        fn swap_input_directive(&self, input: &str) -> String {
            format!("inputs['{}']", input)
        }
    }

    fn parse(lines: &[&str]) -> (Vec<String>, Vec<String>) {
        let mut parser = DirectiveParser::new(RecordingHooks);
        let lines: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
        let parsed = parser.parse(&lines);
        (parsed, parser.screen_parameters().to_vec())
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // SCREEN DIRECTIVES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_escaped_quote_span_with_location_assignment() {
        let (parsed, parameters) =
            parse(&[r#"button.onclick="window.location.href=\"mobilang:screen:home?id=1\"""#]);
        assert_eq!(parsed, vec![r#"button.onclick="navigate('home', {id:1})""#]);
        assert_eq!(parameters, vec!["id"]);
    }

    #[test]
    fn test_double_colon_form_keeps_its_quotes() {
        let (parsed, parameters) = parse(&[r#"go("mobilang::screen::product?id=7&tab=2");"#]);
        assert_eq!(parsed, vec![r#"go("navigate('product', {id:7, tab:2})");"#]);
        assert_eq!(parameters, vec!["id", "tab"]);
    }

    #[test]
    fn test_screen_without_parameters_replaces_marker_only() {
        let (parsed, parameters) = parse(&[r#"navigation.navigate("mobilang:screen:home");"#]);
        assert_eq!(parsed, vec![r#"navigation.navigate("homeScreen");"#]);
        assert!(parameters.is_empty());
    }

    #[test]
    fn test_concatenated_parameters_are_joined() {
        let (parsed, parameters) = parse(&[
            r#"window.location.href = "mobilang:screen:product?id=" + data[item].id + "&q=123";"#,
        ]);
        assert_eq!(parsed, vec!["navigate('product', {id:data[item].id, q:123});"]);
        assert_eq!(parameters, vec!["id", "q"]);
    }

    #[test]
    fn test_trailing_expression_parameter() {
        let (parsed, _) = parse(&[r#"props.navigation.navigate("mobilang:screen:product?id=" + id);"#]);
        assert_eq!(
            parsed,
            vec!["props.navigation.navigate(navigate('product', {id:id}));"]
        );
    }

    #[test]
    fn test_several_screen_directives_on_one_line() {
        let (parsed, _) = parse(&[r#"a("mobilang:screen:one"); b("mobilang:screen:two");"#]);
        assert_eq!(parsed, vec![r#"a("oneScreen"); b("twoScreen");"#]);
    }

    #[test]
    fn test_screen_parameters_collapse_duplicates_across_lines() {
        let (_, parameters) = parse(&[
            r#"go("mobilang::screen::a?id=1&sort=asc");"#,
            r#"go("mobilang::screen::b?page=2&id=3");"#,
        ]);
        assert_eq!(parameters, vec!["id", "sort", "page"]);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // PARAM / INPUT DIRECTIVES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_param_directive_consumes_its_quotes() {
        let (parsed, _) = parse(&[r#"let id = "mobilang:param:id";"#, "let q = mobilang::param::q;"]);
        assert_eq!(parsed, vec!["let id = route.params.id;", "let q = route.params.q;"]);
    }

    #[test]
    fn test_input_directive() {
        let (parsed, _) = parse(&["let name = 'mobilang::input::user-name';"]);
        assert_eq!(parsed, vec!["let name = inputs['user-name'];"]);
    }

    #[test]
    fn test_screen_wins_over_param_on_the_same_line() {
        let (parsed, _) = parse(&[r#"go("mobilang:screen:home", "mobilang:param:id")"#]);
        assert_eq!(parsed, vec![r#"go("homeScreen", "mobilang:param:id")"#]);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // PASSTHROUGH AND STATE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_mismatched_markers_pass_through() {
        let lines = [
            r#"let x = "mobilang:unknown:foo";"#,
            r#"let y = "mobilang:screen:";"#,
            "console.log('plain');",
        ];
        let (parsed, parameters) = parse(&lines);
        assert_eq!(parsed, lines.to_vec());
        assert!(parameters.is_empty());
    }

    #[test]
    fn test_parse_resets_state_between_calls() {
        let mut parser = DirectiveParser::new(RecordingHooks);
        parser.parse(&[r#"go("mobilang::screen::a?id=1");"#.to_string()]);
        assert_eq!(parser.screen_parameters(), ["id".to_string()]);

        let parsed = parser.parse(&["plain();".to_string()]);
        assert!(parser.screen_parameters().is_empty());
        assert_eq!(parser.parsed_code(), parsed.as_slice());
        assert_eq!(parsed, vec!["plain();"]);
    }

    #[test]
    fn test_hooks_can_be_borrowed() {
        let hooks = RecordingHooks;
        let mut parser = DirectiveParser::new(&hooks);
        assert_eq!(
            parser.parse(&["mobilang:screen:home".to_string()]),
            vec!["homeScreen"]
        );
    }
}
