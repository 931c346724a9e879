use forumcode_core::{
    DiagnosticSeverity, E_QUOTE_UNBALANCED, EmbedKind, RenderContext, W_EMBED_ID_SHORT,
    W_QUOTE_NESTED, embed_markup, excerpt, mention_markup, quote_markup, transform, validate,
};

#[test]
fn excerpt_strips_markup_and_marks_rich_content() {
    let source = "[b]Captură[/b] de azi\n[record]12[/record]\n[quote=ion]vechi[/quote]\
                  [img]https://x.ro/a.jpg[/img] [video]https://youtu.be/abc[/video] [mention]ana[/mention]";
    assert_eq!(
        excerpt(source, None),
        "Captură de azi [Record] [Quote] [Image] [Video] @ana"
    );
}

#[test]
fn excerpt_cuts_on_character_boundary() {
    assert_eq!(excerpt("ăăăăă ăăă", Some(6)), "ăăăăă…");
    assert_eq!(excerpt("scurt", Some(10)), "scurt");
}

#[test]
fn validate_reports_short_ids_and_unbalanced_quotes() {
    let diagnostics = validate("[gear]7[/gear]\n[quote]a");
    let codes: Vec<_> = diagnostics.iter().map(|d| d.code).collect();
    assert!(codes.contains(&W_EMBED_ID_SHORT));
    assert!(codes.contains(&E_QUOTE_UNBALANCED));
    let error = diagnostics
        .iter()
        .find(|d| d.code == E_QUOTE_UNBALANCED)
        .map(|d| d.severity);
    assert_eq!(error, Some(DiagnosticSeverity::Error));
}

#[test]
fn validate_includes_resolver_findings() {
    let diagnostics = validate("[quote][quote]x[/quote]y[/quote]");
    assert_eq!(
        diagnostics.iter().map(|d| d.code).collect::<Vec<_>>(),
        vec![W_QUOTE_NESTED]
    );
}

#[test]
fn clean_posts_validate_clean() {
    assert!(validate("[b]ok[/b] [record]123[/record]").is_empty());
}

#[test]
fn generated_markup_round_trips_through_the_parser() {
    let source = format!(
        "{}{} {}",
        quote_markup("ana", "12", "text"),
        embed_markup(EmbedKind::Gear, "abc"),
        mention_markup("ion")
    );
    let out = transform(&source, &RenderContext::new());
    assert!(out.diagnostics.is_empty());
    assert_eq!(out.quotes.len(), 1);
    assert_eq!(out.embeds.len(), 1);
    assert!(out.html.contains("class=\"fc-mention\""));
}
