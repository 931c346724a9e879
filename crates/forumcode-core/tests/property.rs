use std::panic;

use forumcode_core::{
    Document, Node, NodeKind, RenderContext, TopicLocation, emit_html, escape, parse, resolve,
    transform,
};

const CASES: usize = 200;
const MAX_TOKENS: usize = 96;
const TOKENS: &[&str] = &[
    "a", "b", "ana", " ", " ", "\n", "\r\n", "<", ">", "&", "\"", "'", "ă", "🐟", "[", "]", "=",
    "[b]", "[/b]", "[i]", "[/i]", "[u]", "[/u]", "[s]", "[/s]", "[h1]", "[/h1]", "[H2]", "[/h3]",
    "[list]", "[list=1]", "[/list]", "[*]", "[/*]", "[code]", "[/code]", "[url]", "[/url]",
    "[url=https://pescuit.ro]", "[url=javascript:x]", "https://pescuit.ro/a?b=1&c=2",
    "[img]", "[/img]", "[video]", "[/video]", "https://youtu.be/abc123", "[spoiler]",
    "[/spoiler]", "[mention]", "[/mention]", "[quote]", "[quote=ana]",
    "[quote user=\"ana\" post_id=\"12\"]", "[quote post_id=\"x y\"]", "[/quote]", "[record]",
    "[/record]", "[catch]", "[/catch]", "[gear]", "[/gear]", "42",
];

#[test]
fn pipeline_never_panics_on_random_input() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x5eed_f150_0000_0001);
    let context = RenderContext::new().with_location(TopicLocation::new("crap", "snagov"));
    for case in 0..CASES {
        let len = rng.gen_range(0, MAX_TOKENS + 1);
        let source = random_source(&mut rng, len);
        let result = panic::catch_unwind(|| transform(&source, &context));
        if result.is_err() {
            return Err(format!("transform panicked for case {}: {:?}", case, source).into());
        }
    }
    Ok(())
}

#[test]
fn output_is_well_formed_and_whitelisted() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x2b7e_1516_28ae_d2a6);
    let context = RenderContext::new();
    for case in 0..CASES {
        let len = rng.gen_range(0, MAX_TOKENS + 1);
        let source = random_source(&mut rng, len);
        let html = transform(&source, &context).html;
        let wrapped = format!("<root>{}</root>", html);
        let doc = roxmltree::Document::parse(&wrapped).map_err(|err| {
            format!(
                "case {} is not well-formed ({}):\nsource: {:?}\nhtml: {}",
                case, err, source, html
            )
        })?;
        for node in doc.descendants().filter(|node| node.is_element()) {
            let name = node.tag_name().name();
            if name == "root" {
                continue;
            }
            if !ALLOWED_TAGS.contains(&name) {
                return Err(format!("case {} emitted <{}>: {}", case, name, html).into());
            }
            for attr in node.attributes() {
                let attr_name = attr.name();
                if !ALLOWED_ATTRS.contains(&attr_name) && !attr_name.starts_with("data-") {
                    return Err(format!(
                        "case {} emitted attribute {} on <{}>: {}",
                        case, attr_name, name, html
                    )
                    .into());
                }
            }
        }
    }
    Ok(())
}

#[test]
fn resolved_quotes_never_contain_quotes() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x9e37_79b9_7f4a_7c15);
    let context = RenderContext::new();
    for case in 0..CASES {
        let len = rng.gen_range(0, MAX_TOKENS + 1);
        let source = random_source(&mut rng, len);
        let parsed = parse(&source);
        let resolved = resolve(parsed.document, &context, &parsed.line_index);
        if let Err(message) = check_quotes(&resolved.document.nodes, false) {
            return Err(format!("case {}: {}\nsource: {:?}", case, message, source).into());
        }
    }
    Ok(())
}

#[test]
fn top_level_spans_are_ordered_and_in_bounds() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x1234_5678_9abc_def1);
    for case in 0..CASES {
        let len = rng.gen_range(0, MAX_TOKENS + 1);
        let source = random_source(&mut rng, len);
        let document = parse(&source).document;
        check_spans(&document, source.len())
            .map_err(|message| format!("case {}: {}\nsource: {:?}", case, message, source))?;
    }
    Ok(())
}

#[test]
fn plain_text_reaches_output_escaped() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x0bad_cafe_f00d_0001);
    let context = RenderContext::new();
    for case in 0..CASES {
        let len = rng.gen_range(0, 64);
        let source: String = (0..len)
            .map(|_| PLAIN[rng.gen_range(0, PLAIN.len())])
            .collect();
        let parsed = parse(&source);
        let resolved = resolve(parsed.document, &context, &parsed.line_index);
        let html = emit_html(&resolved.document, &context.options);
        let expected = escape(&source).replace('\n', "<br />");
        if html != expected {
            return Err(format!("case {}: {:?} rendered as {:?}", case, source, html).into());
        }
    }
    Ok(())
}

const PLAIN: &[char] = &['a', 'z', ' ', '<', '>', '&', '"', '\'', '\n', 'ș', ']', '='];

const ALLOWED_TAGS: &[&str] = &[
    "a", "blockquote", "br", "code", "details", "div", "em", "h1", "h2", "h3", "iframe", "img",
    "li", "ol", "pre", "s", "span", "strong", "summary", "u", "ul",
];

const ALLOWED_ATTRS: &[&str] = &[
    "class",
    "href",
    "rel",
    "target",
    "src",
    "alt",
    "loading",
    "allow",
    "allowfullscreen",
    "frameborder",
    "title",
];

fn check_quotes(nodes: &[Node], inside_quote: bool) -> Result<(), String> {
    for node in nodes {
        match &node.kind {
            NodeKind::Quote(quote) => {
                if inside_quote {
                    return Err(format!("quote at {:?} is nested in a quote", node.span));
                }
                check_quotes(&quote.body, true)?;
            }
            NodeKind::List(list) => {
                for item in &list.items {
                    check_quotes(item, inside_quote)?;
                }
            }
            NodeKind::Emphasis { children, .. }
            | NodeKind::Heading { children, .. }
            | NodeKind::Link { children, .. }
            | NodeKind::Spoiler { children } => check_quotes(children, inside_quote)?,
            _ => {}
        }
    }
    Ok(())
}

fn check_spans(document: &Document, source_len: usize) -> Result<(), String> {
    let mut prev_end = 0;
    for (idx, node) in document.nodes.iter().enumerate() {
        if node.span.start > node.span.end || node.span.end > source_len {
            return Err(format!("node {} span {:?} out of bounds", idx, node.span));
        }
        if node.span.start < prev_end {
            return Err(format!(
                "node {} span {:?} overlaps previous end {}",
                idx, node.span, prev_end
            ));
        }
        prev_end = node.span.end;
    }
    Ok(())
}

fn random_source(rng: &mut Lcg, tokens: usize) -> String {
    let mut out = String::new();
    for _ in 0..tokens {
        let idx = rng.gen_range(0, TOKENS.len());
        out.push_str(TOKENS.get(idx).copied().unwrap_or(" "));
    }
    out
}

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn gen_range(&mut self, min: usize, max: usize) -> usize {
        if max <= min {
            return min;
        }
        let span = max - min;
        let value = (self.next() >> 1) as usize;
        min + (value % span)
    }
}
