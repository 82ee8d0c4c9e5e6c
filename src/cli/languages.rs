use module_sentinel::index::Language;
use module_sentinel::indexer::syntax::{SyntaxProvider, TreeSitterProvider};

pub fn list_languages() {
    println!("Supported languages:");
    for language in Language::ALL {
        let provider = TreeSitterProvider::new(language);
        let status = if provider.is_available() {
            "tree-sitter".to_string()
        } else {
            format!("pattern fallback only ({})", provider.init_error().unwrap_or("unknown"))
        };
        println!(
            "  {:<12} .{:<36} scope '{}'  [{}]",
            language.as_str(),
            language.extensions().join(" ."),
            language.scope_separator(),
            status
        );
    }
}
