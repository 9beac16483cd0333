//! Ionic Module for MobiLang Compiler
//!
//! Emits one Angular page per screen. The browser DOM survives on this target,
//! so screen scripts run almost as written; only navigation and directives are
//! rewritten.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coder::{component_name, normalized_behavior, CodeFile, Framework, Screen};
use crate::directive::{DirectiveHooks, DirectiveParser};
use crate::errors::CoderResult;
use crate::script::{function_to_method, hoist_functions, ScriptNormalizer};
use crate::tag::{TagId, TagTree};
use crate::transpile::{rewrite_navigation, TranspilerOptions};

lazy_static! {
    static ref IMPORT_RE: Regex = Regex::new(r"^\s*import\s").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IonicOptions {
    pub pages_dir: String,
    pub routing_file: String,
}

impl Default for IonicOptions {
    fn default() -> Self {
        Self {
            pages_dir: "src/app/".to_string(),
            routing_file: "src/app/app-routing.module.ts".to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVE HOOKS
// ═══════════════════════════════════════════════════════════════════════════════

pub struct IonicHooks;

impl DirectiveHooks for IonicHooks {
    fn swap_screen_directive(&self, screen: &str) -> String {
        format!("/{}", screen)
    }

    /// `'/product?id=' + encodeURIComponent(data.id) + '&tab=' + encodeURIComponent(2)`
    fn swap_screen_directive_with_parameters(
        &self,
        screen: &str,
        parameters: &[(String, String)],
    ) -> String {
        let mut url = format!("'/{}?", screen);
        for (index, (key, value)) in parameters.iter().enumerate() {
            if index > 0 {
                url.push_str(" + '&");
            }
            if value.is_empty() {
                url.push_str(key);
                url.push('\'');
            } else {
                url.push_str(&format!("{}=' + encodeURIComponent({})", key, value));
            }
        }
        if parameters.is_empty() {
            url.push('\'');
        }
        url
    }

    fn swap_param_directive(&self, param: &str) -> String {
        format!("this.route.snapshot.queryParamMap.get(\"{}\")", param)
    }

    fn swap_input_directive(&self, input: &str) -> String {
        format!("this.input_{}", input.replace('-', "_"))
    }

    fn keeps_directive_quotes(&self) -> bool {
        false
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRUCTURE
// ═══════════════════════════════════════════════════════════════════════════════

/// A screen structure prepared for an Angular template.
pub struct IonicStructure {
    pub tree: TagTree,
    /// Ids of inputs bound through `ngModel`.
    pub inputs: Vec<String>,
}

fn template_navigation() -> TranspilerOptions {
    TranspilerOptions {
        location_read: "router.url".to_string(),
        navigation_call: Some("router.navigateByUrl".to_string()),
    }
}

fn class_navigation() -> TranspilerOptions {
    TranspilerOptions {
        location_read: "this.router.url".to_string(),
        navigation_call: Some("this.router.navigateByUrl".to_string()),
    }
}

/// Binds inputs with `ngModel` and turns `onclick` into `(click)` handlers.
pub fn parse_structure(source: &TagTree, start: TagId) -> IonicStructure {
    let mut tree = source.clone();
    let mut inputs = Vec::new();
    let navigation = template_navigation();

    for id in source.descendants(start) {
        let Some(tag) = tree.get_mut(id) else {
            continue;
        };
        if tag.name == "input" {
            if let Some(input_id) = tag.id().map(str::to_string) {
                let binding = format!("input_{}", input_id.replace('-', "_"));
                tag.prepend_attribute("[(ngModel)]", binding.as_str());
                debug!(input = input_id.as_str(), "bound input");
                if !inputs.contains(&input_id) {
                    inputs.push(input_id);
                }
            }
        }
        if let Some(handler) = tag.attribute("onclick").map(|value| value.as_str().to_string()) {
            tag.set_attribute("onclick", rewrite_navigation(&handler, &navigation));
            tag.rename_attribute("onclick", "(click)");
        }
    }

    IonicStructure { tree, inputs }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAMEWORK
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct IonicFramework {
    pub options: IonicOptions,
}

impl IonicFramework {
    pub fn new(options: IonicOptions) -> Self {
        Self { options }
    }

    fn page_path(&self, screen: &str, suffix: &str) -> String {
        format!("{}{}/{}{}", self.options.pages_dir, screen, screen, suffix)
    }

    fn template(&self, screen: &Screen, structure: &IonicStructure) -> Vec<String> {
        let mut parser = DirectiveParser::new(IonicHooks);
        let body = parser.parse(&structure.tree.to_code(structure.tree.root()));

        let mut code = vec![
            "<ion-header>".to_string(),
            "    <ion-toolbar>".to_string(),
            format!("        <ion-title>{}</ion-title>", screen.name),
            "    </ion-toolbar>".to_string(),
            "</ion-header>".to_string(),
            "<ion-content>".to_string(),
        ];
        code.extend(body.into_iter().map(|line| format!("    {}", line)));
        code.push("</ion-content>".to_string());
        code
    }

    fn component(
        &self,
        screen: &Screen,
        structure: &IonicStructure,
        script: &[String],
    ) -> Vec<String> {
        let navigation = class_navigation();
        let rewritten: Vec<String> = script
            .iter()
            .map(|line| rewrite_navigation(line, &navigation))
            .collect();
        let (imports, body): (Vec<String>, Vec<String>) = DirectiveParser::new(IonicHooks)
            .parse(&rewritten)
            .into_iter()
            .partition(|line| IMPORT_RE.is_match(line));

        let class = format!("{}Page", component_name(&screen.name));
        let mut code = vec![
            "import { AfterViewInit, Component } from '@angular/core';".to_string(),
            "import { ActivatedRoute, Router } from '@angular/router';".to_string(),
        ];
        code.extend(imports);
        code.push(String::new());
        code.push("@Component({".to_string());
        code.push(format!("    selector: 'app-{}',", screen.name));
        code.push(format!("    templateUrl: './{}.page.html',", screen.name));
        code.push(format!("    styleUrls: ['./{}.page.scss'],", screen.name));
        code.push("})".to_string());
        code.push(format!("export class {} implements AfterViewInit {{", class));
        for input in &structure.inputs {
            code.push(format!("    input_{}: string = '';", input.replace('-', "_")));
        }
        if !structure.inputs.is_empty() {
            code.push(String::new());
        }
        code.push(
            "    constructor(public route: ActivatedRoute, public router: Router) {}".to_string(),
        );
        code.push(String::new());
        let hoisted = hoist_functions(&body);
        code.push("    ngAfterViewInit(): void {".to_string());
        code.extend(hoisted.rest.iter().map(|line| format!("        {}", line)));
        code.push("    }".to_string());
        for function in &hoisted.functions {
            code.push(String::new());
            for (index, line) in function.iter().enumerate() {
                let line = if index == 0 { function_to_method(line) } else { line.clone() };
                code.push(format!("    {}", line));
            }
        }
        code.push("}".to_string());
        code
    }

    fn module(&self, screen: &Screen) -> Vec<String> {
        let class = format!("{}Page", component_name(&screen.name));
        vec![
            "import { NgModule } from '@angular/core';".to_string(),
            "import { CommonModule } from '@angular/common';".to_string(),
            "import { FormsModule } from '@angular/forms';".to_string(),
            "import { RouterModule } from '@angular/router';".to_string(),
            "import { IonicModule } from '@ionic/angular';".to_string(),
            String::new(),
            format!("import {{ {} }} from './{}.page';", class, screen.name),
            String::new(),
            "@NgModule({".to_string(),
            "    imports: [".to_string(),
            "        CommonModule,".to_string(),
            "        FormsModule,".to_string(),
            "        IonicModule,".to_string(),
            format!("        RouterModule.forChild([{{ path: '', component: {} }}]),", class),
            "    ],".to_string(),
            format!("    declarations: [{}],", class),
            "})".to_string(),
            format!("export class {}PageModule {{}}", component_name(&screen.name)),
        ]
    }
}

impl Framework for IonicFramework {
    fn name(&self) -> &'static str {
        "ionic"
    }

    fn dependencies(&self) -> Vec<String> {
        ["@ionic/angular", "@angular/router", "@angular/forms"]
            .iter()
            .map(|dependency| dependency.to_string())
            .collect()
    }

    fn generate_screen(
        &self,
        screen: &Screen,
        normalizer: &dyn ScriptNormalizer,
    ) -> CoderResult<Vec<CodeFile>> {
        let script = normalized_behavior(screen, normalizer)?;
        let structure = parse_structure(&screen.structure, screen.structure.root());

        Ok(vec![
            CodeFile::new(
                self.page_path(&screen.name, ".page.html"),
                self.template(screen, &structure),
            ),
            CodeFile::new(
                self.page_path(&screen.name, ".page.scss"),
                screen.style.to_code(),
            ),
            CodeFile::new(
                self.page_path(&screen.name, ".page.ts"),
                self.component(screen, &structure, &script),
            ),
            CodeFile::new(
                self.page_path(&screen.name, ".module.ts"),
                self.module(screen),
            ),
        ])
    }

    fn generate_project_files(&self, screens: &[String]) -> Vec<CodeFile> {
        let mut code = vec![
            "import { NgModule } from '@angular/core';".to_string(),
            "import { PreloadAllModules, RouterModule, Routes } from '@angular/router';"
                .to_string(),
            String::new(),
            "const routes: Routes = [".to_string(),
        ];
        if let Some(first) = screens.first() {
            code.push(format!(
                "    {{ path: '', redirectTo: '{}', pathMatch: 'full' }},",
                first
            ));
        }
        for screen in screens {
            code.push(format!(
                "    {{ path: '{0}', loadChildren: () => import('./{0}/{0}.module').then(m => m.{1}PageModule) }},",
                screen,
                component_name(screen)
            ));
        }
        code.push("];".to_string());
        code.push(String::new());
        code.push("@NgModule({".to_string());
        code.push(
            "    imports: [RouterModule.forRoot(routes, { preloadingStrategy: PreloadAllModules })],"
                .to_string(),
        );
        code.push("    exports: [RouterModule],".to_string());
        code.push("})".to_string());
        code.push("export class AppRoutingModule {}".to_string());

        vec![CodeFile::new(self.options.routing_file.clone(), code)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_markup;
    use pretty_assertions::assert_eq;

    #[test]
    fn hooks_build_route_urls() {
        let hooks = IonicHooks;
        assert_eq!(hooks.swap_screen_directive("home"), "/home");
        assert_eq!(
            hooks.swap_screen_directive_with_parameters(
                "product",
                &[("id".into(), "data.id".into()), ("tab".into(), "2".into())]
            ),
            "'/product?id=' + encodeURIComponent(data.id) + '&tab=' + encodeURIComponent(2)"
        );
        assert_eq!(
            hooks.swap_screen_directive_with_parameters("list", &[("all".into(), String::new())]),
            "'/list?all'"
        );
        assert_eq!(
            hooks.swap_param_directive("id"),
            "this.route.snapshot.queryParamMap.get(\"id\")"
        );
        assert_eq!(hooks.swap_input_directive("email"), "this.input_email");
    }

    #[test]
    fn double_colon_navigation_builds_a_url_expression() {
        let mut parser = DirectiveParser::new(IonicHooks);
        let parsed = parser.parse(&[
            r#"this.router.navigateByUrl('mobilang::screen::detail?id=' + item.id);"#.to_string(),
        ]);
        assert_eq!(
            parsed,
            vec!["this.router.navigateByUrl('/detail?id=' + encodeURIComponent(item.id));"]
        );
    }

    #[test]
    fn structure_binds_inputs_and_click_handlers() {
        let tree = parse_markup(
            r#"<div><input id="email" type="text"><button onclick="window.location.href='mobilang:screen:home'">Go</button></div>"#,
        )
        .unwrap();
        let structure = parse_structure(&tree, tree.root());

        assert_eq!(structure.inputs, vec!["email"]);
        assert_eq!(
            structure.tree.to_code(structure.tree.root()),
            vec![
                "<div>",
                r#"    <input [(ngModel)]="input_email" id="email" type="text">"#,
                r#"    <button (click)="router.navigateByUrl('mobilang:screen:home')">Go</button>"#,
                "</div>",
            ]
        );
    }

    #[test]
    fn routing_module_registers_lazy_routes() {
        let framework = IonicFramework::default();
        let files = framework.generate_project_files(&["home".to_string(), "product".to_string()]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "src/app/app-routing.module.ts");
        assert!(files[0].code.contains(
            &"    { path: 'product', loadChildren: () => import('./product/product.module').then(m => m.ProductPageModule) },".to_string()
        ));
        assert!(files[0]
            .code
            .contains(&"    { path: '', redirectTo: 'home', pathMatch: 'full' },".to_string()));
    }
}
