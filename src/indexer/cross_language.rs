// Cross-language relationship detection
//
// Stateless line classifier. Each bridge category is tested independently, so
// one line can yield a subprocess candidate and a REST candidate at once.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::index::{BridgeKind, BridgeMetadata, Language, Relationship, RelationshipKind};

/// A possible edge to code in another runtime
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipCandidate {
    pub bridge: BridgeKind,
    pub kind: RelationshipKind,
    pub target: String,
    pub target_language: Option<String>,
    pub confidence: f32,
    pub cross_language: bool,
    pub line_number: u32,
    pub file_path: String,
    pub source_context: String,
    pub detail: Option<String>,
}

impl RelationshipCandidate {
    pub fn into_relationship(self, from_name: impl Into<String>) -> Relationship {
        Relationship {
            from_name: from_name.into(),
            to_name: self.target.clone(),
            kind: self.kind,
            confidence: self.confidence,
            cross_language: self.cross_language,
            line_number: self.line_number,
            source_context: Some(self.source_context),
            metadata: Some(BridgeMetadata {
                bridge: self.bridge,
                target_language: self.target_language,
                target: Some(self.target),
                detail: self.detail,
            }),
        }
    }
}

struct Probe {
    bridge: BridgeKind,
    /// Source runtimes the probe applies to; empty means any.
    runtimes: &'static [&'static str],
    regex: Regex,
    confidence: f32,
    target_confidence: f32,
    /// Runtime on the far side when the mechanism implies one.
    hint: Option<&'static str>,
    label: &'static str,
}

fn probe(
    bridge: BridgeKind,
    runtimes: &'static [&'static str],
    pattern: &str,
    confidence: f32,
    target_confidence: f32,
    label: &'static str,
) -> Probe {
    Probe {
        bridge,
        runtimes,
        regex: Regex::new(pattern).expect("bridge probe pattern"),
        confidence,
        target_confidence,
        hint: None,
        label,
    }
}

impl Probe {
    fn towards(mut self, runtime: &'static str) -> Self {
        self.hint = Some(runtime);
        self
    }

    fn applies_to(&self, runtime: &str) -> bool {
        self.runtimes.is_empty() || self.runtimes.contains(&runtime)
    }
}

const JS: &[&str] = &["javascript"];
const PY: &[&str] = &["python"];
const RS: &[&str] = &["rust"];
const GO: &[&str] = &["go"];
const JAVA: &[&str] = &["java"];
const CPP: &[&str] = &["cpp"];
const ANY: &[&str] = &[];

static PROBES: Lazy<Vec<Probe>> = Lazy::new(|| {
    use BridgeKind::*;
    vec![
        // Subprocess spawns
        probe(
            Subprocess,
            JS,
            r#"(?:^|[^.\w])(?P<call>spawnSync|spawn|execSync|execFileSync|execFile|exec|fork|execa)\s*\(\s*['"`](?P<command>[^'"`]+)['"`](?:\s*,\s*\[\s*['"`](?P<target>[^'"`]+)['"`])?"#,
            0.7,
            0.9,
            "child_process",
        ),
        probe(
            Subprocess,
            PY,
            r#"\bsubprocess\.(?P<call>run|Popen|call|check_output|check_call)\s*\(\s*\[?\s*['"](?P<command>[^'"\s]+)['"]?(?:\s*,\s*['"](?P<target>[^'"]+)['"])?"#,
            0.7,
            0.9,
            "subprocess",
        ),
        probe(
            Subprocess,
            PY,
            r#"\bos\.(?P<call>system|popen|execvp|execl)\s*\(\s*['"](?P<command>[^'"\s]+)(?:\s+(?P<target>[^'"\s]+))?"#,
            0.7,
            0.9,
            "os",
        ),
        probe(
            Subprocess,
            RS,
            r#"(?P<call>Command::new)\(\s*"(?P<command>[^"]+)"\s*\)(?:\s*\.args?\(\s*\[?\s*"(?P<target>[^"]+)")?"#,
            0.7,
            0.9,
            "std::process",
        ),
        probe(
            Subprocess,
            GO,
            r#"\bexec\.(?P<call>CommandContext|Command)\(\s*(?:\w+\s*,\s*)?"(?P<command>[^"]+)"(?:\s*,\s*"(?P<target>[^"]+)")?"#,
            0.7,
            0.9,
            "os/exec",
        ),
        probe(
            Subprocess,
            JAVA,
            r#"(?P<call>Runtime\.getRuntime\(\)\.exec|new\s+ProcessBuilder)\s*\(\s*(?:new\s+String\[\]\s*\{\s*)?"(?P<command>[^"\s]+)(?:(?:"\s*,\s*"|\s+)(?P<target>[^"\s]+))?"#,
            0.7,
            0.9,
            "java.lang.Process",
        ),
        probe(
            Subprocess,
            CPP,
            r#"(?:^|[^.\w])(?P<call>system|popen|execvp|execlp|execl|posix_spawnp?)\s*\(\s*"(?P<command>[^"\s]+)(?:\s+(?P<target>[^"\s]+))?"#,
            0.7,
            0.85,
            "libc",
        ),
        // REST servers before clients so a route definition is not read as a call
        probe(
            RestApi,
            JS,
            r#"\b(?:app|router|server|api)\.(?P<method>get|post|put|delete|patch|all)\s*\(\s*['"`](?P<target>/[^'"`]*)['"`]"#,
            0.75,
            0.85,
            "server",
        ),
        probe(
            RestApi,
            PY,
            r#"@\w+\.(?P<method>route|get|post|put|delete|patch)\(\s*['"](?P<target>/[^'"]*)['"]"#,
            0.75,
            0.85,
            "server",
        ),
        probe(
            RestApi,
            JAVA,
            r#"@(?P<method>Get|Post|Put|Delete|Patch|Request)Mapping\(\s*(?:value\s*=\s*|path\s*=\s*)?"(?P<target>/[^"]*)""#,
            0.75,
            0.85,
            "server",
        ),
        probe(
            RestApi,
            GO,
            r#"\b(?P<method>HandleFunc|Handle|GET|POST|PUT|DELETE)\(\s*"(?P<target>/[^"]*)""#,
            0.75,
            0.85,
            "server",
        ),
        probe(
            RestApi,
            RS,
            r#"(?:\.route\(|#\[(?P<method>get|post|put|delete|patch)\()\s*"(?P<target>/[^"]*)""#,
            0.75,
            0.85,
            "server",
        ),
        probe(
            RestApi,
            JS,
            r#"\b(?:fetch|axios(?:\.(?P<method>get|post|put|delete|patch))?|\$http\.(?:get|post))\s*\(\s*['"`](?P<target>[^'"`]+)['"`]"#,
            0.75,
            0.9,
            "client",
        ),
        probe(
            RestApi,
            PY,
            r#"\b(?:requests|httpx|session|client)\.(?P<method>get|post|put|delete|patch|request)\s*\(\s*f?['"](?P<target>[^'"]+)['"]"#,
            0.75,
            0.9,
            "client",
        ),
        probe(
            RestApi,
            GO,
            r#"\bhttp\.(?:(?P<method>Get|Post|Head)\(\s*"(?P<target>[^"]+)"|NewRequest(?:WithContext)?\([^,]*?,?\s*"?\w*"?\s*,\s*"(?P<url>[^"]+)")"#,
            0.75,
            0.9,
            "client",
        ),
        probe(
            RestApi,
            RS,
            r#"(?:reqwest::(?:blocking::)?|client\.)(?P<method>get|post|put|delete|patch)\(\s*"(?P<target>[^"]+)""#,
            0.75,
            0.9,
            "client",
        ),
        probe(
            RestApi,
            JAVA,
            r#"(?:URI\.create\(|restTemplate\.\w+\(|new\s+URL\()\s*"(?P<target>[^"]+)""#,
            0.75,
            0.9,
            "client",
        ),
        probe(RestApi, ANY, r#"['"`](?P<target>https?://[^'"`\s]+)['"`]"#, 0.7, 0.75, "url"),
        // RPC
        probe(
            Rpc,
            PY,
            r#"\bgrpc\.(?:insecure_channel|secure_channel)\(\s*['"](?P<target>[^'"]+)['"]|\b(?P<service>\w+)Stub\s*\("#,
            0.75,
            0.85,
            "grpc",
        ),
        probe(
            Rpc,
            JS,
            r#"new\s+(?P<service>\w+)(?:Client|Service)\s*\(\s*['"`](?P<target>[^'"`]+)['"`]|\b(?:grpc|protoLoader)\.load\w*\("#,
            0.75,
            0.85,
            "grpc",
        ),
        probe(
            Rpc,
            GO,
            r#"\bgrpc\.(?:Dial|DialContext|NewClient)\(\s*(?:\w+\s*,\s*)?"(?P<target>[^"]+)"|\bpb\.New(?P<service>\w+)Client\("#,
            0.75,
            0.85,
            "grpc",
        ),
        probe(
            Rpc,
            JAVA,
            r#"ManagedChannelBuilder\.forAddress\(\s*"(?P<target>[^"]+)"|\b(?P<service>\w+)Grpc\.new(?:Blocking|Future)?Stub\("#,
            0.75,
            0.85,
            "grpc",
        ),
        probe(
            Rpc,
            RS,
            r#"\b(?P<service>\w+)Client::connect\(\s*"?(?P<target>[^")\s]*)|tonic::transport::Channel"#,
            0.75,
            0.85,
            "tonic",
        ),
        probe(Rpc, ANY, r#"\bjsonrpc\b|\bJsonRpc\w*|\bxmlrpc\b"#, 0.7, 0.8, "json-rpc"),
        // Native bindings
        probe(
            Ffi,
            PY,
            r#"\bctypes\.(?:CDLL|cdll\.LoadLibrary|WinDLL|PyDLL)\(\s*['"](?P<target>[^'"]+)['"]|\bffi\.dlopen\(\s*['"](?P<target2>[^'"]+)"#,
            0.8,
            0.9,
            "ctypes",
        )
        .towards("cpp"),
        probe(
            Ffi,
            JS,
            r#"require\(\s*['"](?P<target>[^'"]+\.node)['"]|\bffi\.Library\(\s*['"](?P<target2>[^'"]+)['"]"#,
            0.8,
            0.9,
            "node-addon",
        )
        .towards("cpp"),
        probe(Ffi, JS, r#"\bWebAssembly\.instantiate(?:Streaming)?\("#, 0.75, 0.85, "wasm").towards("rust"),
        probe(Ffi, RS, r#"#\[link\(\s*name\s*=\s*"(?P<target>[^"]+)"|\bextern\s+"C""#, 0.8, 0.9, "extern-c")
            .towards("cpp"),
        probe(Ffi, RS, r#"#\[(?:pyfunction|pymodule|pyclass|pymethods)\b"#, 0.8, 0.85, "pyo3").towards("python"),
        probe(Ffi, RS, r#"#\[(?:wasm_bindgen|napi)\b"#, 0.8, 0.85, "js-binding").towards("javascript"),
        probe(Ffi, GO, r#"^\s*import\s+"C"|\bC\.(?P<target>[A-Za-z_]\w*)\("#, 0.8, 0.85, "cgo").towards("cpp"),
        probe(
            Ffi,
            JAVA,
            r#"System\.load(?:Library)?\(\s*"(?P<target>[^"]+)"|\bnative\s+[\w<>\[\]]+\s+\w+\s*\("#,
            0.8,
            0.9,
            "jni",
        )
        .towards("cpp"),
        probe(Ffi, CPP, r#"\bPYBIND11_MODULE\(\s*(?P<target>\w+)|\bPy_Initialize\b|\bBOOST_PYTHON_MODULE\("#, 0.8, 0.9, "python-binding")
            .towards("python"),
        probe(Ffi, CPP, r#"\bNapi::|\bNODE_API_MODULE\(\s*(?P<target>\w+)"#, 0.8, 0.85, "node-api").towards("javascript"),
        probe(Ffi, CPP, r#"\bJNIEXPORT\b|\bJNIEnv\b"#, 0.8, 0.85, "jni").towards("java"),
        // WebSocket
        probe(
            WebSocket,
            ANY,
            r#"new\s+WebSocket\s*\(\s*(?:['"`](?P<target>[^'"`]+)['"`])?|\bwebsockets\.(?:connect|serve)\(\s*(?:['"](?P<target2>[^'"]+)['"])?|\bconnect_async\(\s*(?:"(?P<target3>[^"]+)")?|\bwebsocket\.(?:Dial|DefaultDialer|Upgrader)|@ServerEndpoint\(\s*"(?P<target4>[^"]+)"|\bio\(\s*['"`](?P<target5>[^'"`]+)['"`]"#,
            0.75,
            0.9,
            "websocket",
        ),
        probe(WebSocket, ANY, r#"['"`](?P<target>wss?://[^'"`\s]+)['"`]"#, 0.7, 0.85, "url"),
        // Service discovery
        probe(
            ServiceDiscovery,
            ANY,
            r#"(?:process\.env\.|process\.env\[\s*['"]|os\.environ(?:\.get)?\(?\[?\s*['"]|os\.getenv\(\s*['"]|env::var\(\s*"|os\.Getenv\(\s*"|System\.getenv\(\s*"|getenv\(\s*")(?P<target>[A-Z][A-Z0-9_]*_(?:URL|URI|HOST|ENDPOINT|ADDR|ADDRESS|SERVICE|SERVER))\b"#,
            0.7,
            0.8,
            "env",
        ),
        probe(
            ServiceDiscovery,
            ANY,
            r#"(?P<target>[a-z0-9][a-z0-9-]*\.[a-z0-9-]+\.svc(?:\.cluster\.local)?)"#,
            0.75,
            0.85,
            "kubernetes-dns",
        ),
        probe(ServiceDiscovery, ANY, r#"\bconsul\.\w+|\bConsulClient\b|\bcatalog\.service\("#, 0.7, 0.75, "consul"),
    ]
});

/// Candidates found on one source line.
///
/// Blank and comment lines yield nothing. At most one candidate per bridge category.
pub fn detect(
    line: &str,
    line_number: u32,
    source_language: Language,
    file_path: &str,
) -> Vec<RelationshipCandidate> {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_comment(trimmed, source_language) {
        return Vec::new();
    }

    let runtime = source_language.runtime();
    let mut found: Vec<RelationshipCandidate> = Vec::new();
    for probe in PROBES.iter() {
        if !probe.applies_to(runtime) || found.iter().any(|c| c.bridge == probe.bridge) {
            continue;
        }
        let Some(caps) = probe.regex.captures(line) else {
            continue;
        };
        found.push(build(probe, &caps, line_number, runtime, file_path, trimmed));
    }
    found
}

/// Candidates for a whole file.
///
/// Lines inside a `/* ... */` block are skipped, so block-comment bodies count as
/// comments only where a block is actually open.
pub fn scan(content: &str, source_language: Language, file_path: &str) -> Vec<RelationshipCandidate> {
    let tracks_blocks = source_language != Language::Python;
    let mut in_block = false;
    let mut found = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if in_block {
            in_block = !closes_block(line);
            continue;
        }
        found.extend(detect(line, idx as u32 + 1, source_language, file_path));
        if tracks_blocks {
            in_block = opens_block(line);
        }
    }
    found
}

/// True if the line leaves a `/*` open at its end.
fn opens_block(line: &str) -> bool {
    let mut open = false;
    let mut rest = line;
    loop {
        let marker = if open { "*/" } else { "/*" };
        match rest.find(marker) {
            Some(at) => {
                if !open && rest[..at].contains("//") {
                    return false;
                }
                open = !open;
                rest = &rest[at + 2..];
            }
            None => return open,
        }
    }
}

fn closes_block(line: &str) -> bool {
    match line.find("*/") {
        Some(at) => !opens_block(&line[at + 2..]),
        None => false,
    }
}

fn build(
    probe: &Probe,
    caps: &Captures,
    line_number: u32,
    runtime: &str,
    file_path: &str,
    context: &str,
) -> RelationshipCandidate {
    let group = |name: &str| caps.name(name).map(|m| m.as_str().trim().to_string()).filter(|s| !s.is_empty());
    let concrete = ["target", "target2", "target3", "target4", "target5", "url"]
        .iter()
        .find_map(|name| group(name));

    let (target, target_language, detail) = if probe.bridge == BridgeKind::Subprocess {
        let command = group("command").unwrap_or_default();
        let program = command.split_whitespace().next().unwrap_or_default().to_string();
        let language = infer_target_language(&program, concrete.as_deref()).map(str::to_string);
        let execution = group("call").unwrap_or_else(|| "spawn".to_string());
        let mut detail = format!("library={}; call={}; command={}", probe.label, execution, program);
        if let Some(arg) = &concrete {
            detail.push_str(&format!("; args={}", arg));
        }
        (concrete.clone().unwrap_or(program), language, Some(detail))
    } else {
        let service = group("service");
        let target = concrete
            .clone()
            .or_else(|| service.clone())
            .unwrap_or_else(|| probe.label.to_string());
        let mut detail = probe.label.to_string();
        if let Some(method) = group("method") {
            detail = format!("{}:{}", detail, method.to_ascii_uppercase());
        }
        if let Some(service) = service {
            detail = format!("{}; service={}", detail, service);
        }
        (target, probe.hint.map(str::to_string), Some(detail))
    };

    let confidence = if concrete.is_some() || (probe.bridge == BridgeKind::Subprocess && target_language.is_some()) {
        probe.target_confidence
    } else {
        probe.confidence
    };
    let cross_language = match (&probe.bridge, target_language.as_deref()) {
        (BridgeKind::Subprocess, Some(lang)) => lang != runtime,
        _ => true,
    };

    RelationshipCandidate {
        bridge: probe.bridge,
        kind: probe.bridge.relationship_kind(),
        target,
        target_language,
        confidence,
        cross_language,
        line_number,
        file_path: file_path.to_string(),
        source_context: context.to_string(),
        detail,
    }
}

fn is_comment(trimmed: &str, language: Language) -> bool {
    match language {
        Language::Python => trimmed.starts_with('#'),
        _ => trimmed.starts_with("//") || trimmed.starts_with("/*"),
    }
}

/// Runtime a spawned command or script belongs to, if it can be told.
pub fn infer_target_language(command: &str, script: Option<&str>) -> Option<&'static str> {
    if let Some(language) = script.and_then(language_of_extension) {
        return Some(language);
    }
    let program = command.rsplit(['/', '\\']).next().unwrap_or(command);
    let program = program.trim_end_matches(".exe");
    let by_name = match program {
        p if p.starts_with("python") => Some("python"),
        "pip" | "pip3" | "uvicorn" | "gunicorn" | "pytest" | "poetry" => Some("python"),
        "node" | "npm" | "npx" | "yarn" | "pnpm" | "deno" | "bun" | "ts-node" | "tsx" => Some("javascript"),
        "cargo" | "rustc" => Some("rust"),
        "go" => Some("go"),
        "java" | "javac" | "mvn" | "gradle" | "gradlew" => Some("java"),
        "psql" | "mysql" | "sqlite3" | "sqlcmd" => Some("sql"),
        "redis-cli" | "memcached" => Some("cache"),
        "docker" | "podman" | "kubectl" | "helm" => Some("container"),
        _ => None,
    };
    by_name.or_else(|| language_of_extension(program))
}

fn language_of_extension(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "py" => Some("python"),
        "js" | "mjs" | "cjs" | "ts" => Some("javascript"),
        "rs" => Some("rust"),
        "go" => Some("go"),
        "java" | "jar" => Some("java"),
        "sql" => Some("sql"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(line: &str, language: Language) -> RelationshipCandidate {
        let mut found = detect(line, 7, language, "src/app.js");
        assert_eq!(found.len(), 1, "candidates for {:?}: {:?}", line, found);
        found.remove(0)
    }

    #[test]
    fn test_spawn_python_script() {
        let candidate = one("const r = spawn('python3', ['script.py'])", Language::JavaScript);
        assert_eq!(candidate.bridge, BridgeKind::Subprocess);
        assert_eq!(candidate.kind, RelationshipKind::Spawns);
        assert_eq!(candidate.target, "script.py");
        assert_eq!(candidate.target_language.as_deref(), Some("python"));
        assert!(candidate.cross_language);
        assert!(candidate.confidence >= 0.7);
        assert_eq!(candidate.line_number, 7);
        assert!(candidate.detail.unwrap().contains("call=spawn"));
    }

    #[test]
    fn test_same_language_subprocess_is_not_cross_language() {
        let candidate = one("subprocess.run(['python', 'worker.py'])", Language::Python);
        assert_eq!(candidate.target_language.as_deref(), Some("python"));
        assert!(!candidate.cross_language);
    }

    #[test]
    fn test_regex_exec_is_not_a_spawn() {
        assert!(detect("const m = pattern.exec('abc')", 1, Language::JavaScript, "a.js").is_empty());
    }

    #[test]
    fn test_rust_command() {
        let candidate = one(r#"let out = Command::new("node").arg("build.js").output()?;"#, Language::Rust);
        assert_eq!(candidate.target, "build.js");
        assert_eq!(candidate.target_language.as_deref(), Some("javascript"));
    }

    #[test]
    fn test_rest_client_and_route() {
        let client = one("const res = await fetch('/api/users')", Language::TypeScript);
        assert_eq!(client.bridge, BridgeKind::RestApi);
        assert_eq!(client.kind, RelationshipKind::Invokes);
        assert_eq!(client.target, "/api/users");

        let route = one("@app.get('/items')", Language::Python);
        assert_eq!(route.target, "/items");
        assert!(route.detail.unwrap().starts_with("server"));
    }

    #[test]
    fn test_categories_are_independent() {
        let found = detect(
            "requests.post(os.environ['BILLING_SERVICE_URL'], json=payload)",
            3,
            Language::Python,
            "billing.py",
        );
        let bridges: Vec<BridgeKind> = found.iter().map(|c| c.bridge).collect();
        assert!(bridges.contains(&BridgeKind::ServiceDiscovery));
        let env = found.iter().find(|c| c.bridge == BridgeKind::ServiceDiscovery).unwrap();
        assert_eq!(env.target, "BILLING_SERVICE_URL");
    }

    #[test]
    fn test_ffi_and_rpc() {
        let ffi = one(r#"lib = ctypes.CDLL("./libfast.so")"#, Language::Python);
        assert_eq!(ffi.kind, RelationshipKind::BindsTo);
        assert_eq!(ffi.target_language.as_deref(), Some("cpp"));
        assert_eq!(ffi.confidence, 0.9);

        let rpc = one(r#"conn, err := grpc.Dial("inventory:50051", opts...)"#, Language::Go);
        assert_eq!(rpc.bridge, BridgeKind::Rpc);
        assert_eq!(rpc.target, "inventory:50051");
    }

    #[test]
    fn test_websocket() {
        let ws = one("const socket = new WebSocket('wss://feed.example.com/live')", Language::JavaScript);
        assert_eq!(ws.kind, RelationshipKind::Communicates);
        assert_eq!(ws.target, "wss://feed.example.com/live");
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        assert!(detect("// spawn('python3', ['x.py'])", 1, Language::JavaScript, "a.js").is_empty());
        assert!(detect("# subprocess.run(['go', 'run'])", 1, Language::Python, "a.py").is_empty());
        assert!(detect("   ", 1, Language::Go, "a.go").is_empty());
    }

    #[test]
    fn test_dereference_line_is_code() {
        let found = detect(r#"*out = system("python3 tool.py");"#, 4, Language::Cpp, "run.cpp");
        let spawn = found.iter().find(|c| c.bridge == BridgeKind::Subprocess).unwrap();
        assert_eq!(spawn.target, "tool.py");
        assert_eq!(spawn.target_language.as_deref(), Some("python"));
    }

    #[test]
    fn test_scan_skips_block_comment_bodies() {
        let source = [
            "/**",
            " * spawn('python3', ['doc.py'])",
            " */",
            "function run(out) {",
            "    *out = 1;",
            "    const r = spawn('python3', ['real.py']); /* trailing",
            "       spawn('node', ['hidden.js']) */",
            "    return spawn('go', ['main.go']);",
            "}",
        ]
        .join("\n");
        let found = scan(&source, Language::JavaScript, "a.js");
        let targets: Vec<(&str, u32)> = found.iter().map(|c| (c.target.as_str(), c.line_number)).collect();
        assert_eq!(targets, vec![("real.py", 6), ("main.go", 8)]);
    }

    #[test]
    fn test_block_markers() {
        assert!(opens_block("int x; /* start"));
        assert!(!opens_block("int x; /* closed */ int y;"));
        assert!(!opens_block("// not /* a block"));
        assert!(closes_block(" * end */ int y;"));
        assert!(!closes_block(" * still inside"));
        assert!(!closes_block("end */ again /* open"));
    }

    #[test]
    fn test_infer_target_language() {
        assert_eq!(infer_target_language("/usr/bin/python3", None), Some("python"));
        assert_eq!(infer_target_language("sh", Some("migrate.sql")), Some("sql"));
        assert_eq!(infer_target_language("docker", None), Some("container"));
        assert_eq!(infer_target_language("ls", None), None);
    }

    #[test]
    fn test_into_relationship_carries_bridge_metadata() {
        let relationship = one("const r = spawn('python3', ['script.py'])", Language::JavaScript)
            .into_relationship("runJob");
        assert_eq!(relationship.from_name, "runJob");
        assert_eq!(relationship.to_name, "script.py");
        let metadata = relationship.metadata.unwrap();
        assert_eq!(metadata.bridge, BridgeKind::Subprocess);
        assert_eq!(metadata.target_language.as_deref(), Some("python"));
    }
}
