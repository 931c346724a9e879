use forumcode_core::{
    PermalinkTarget, PostNumberMap, PostRef, RenderContext, TopicLocation, W_POST_REF_AMBIGUOUS,
    W_QUOTE_NESTED, W_QUOTE_REF_INVALID, resolve_permalink, transform,
};

fn topic() -> TopicLocation {
    TopicLocation::new("crap", "lacul-snagov").with_category("pescuit")
}

#[test]
fn quote_block_shows_author_link_and_body() {
    let context = RenderContext::new().with_location(topic());
    let out = transform(
        "[quote user=\"ana\" post_id=\"12\"]Salut[/quote]\nRăspuns",
        &context,
    );
    assert_eq!(
        out.html,
        "<blockquote class=\"fc-quote\" data-post-ref=\"12\"><div class=\"fc-quote-header\">\
         <span class=\"fc-quote-author\">ana</span>\
         <a class=\"fc-quote-link\" href=\"/forum/pescuit/crap/lacul-snagov#post12\">View post</a></div>\
         <div class=\"fc-quote-body\">Salut</div></blockquote>Răspuns"
    );
    assert_eq!(out.quotes.len(), 1);
    assert_eq!(out.quotes[0].quoted_author.as_deref(), Some("ana"));
    assert_eq!(out.quotes[0].quoted_post_ref, Some(PostRef::Number(12)));
    assert_eq!(out.quotes[0].body, "Salut");
}

#[test]
fn bare_quote_has_no_header() {
    let out = transform("[quote]just text[/quote]", &RenderContext::new());
    assert_eq!(
        out.html,
        "<blockquote class=\"fc-quote\"><div class=\"fc-quote-body\">just text</div></blockquote>"
    );
}

#[test]
fn quote_author_from_argument() {
    let out = transform("[quote=ion]x[/quote]", &RenderContext::new());
    assert!(out.html.contains("<span class=\"fc-quote-author\">ion</span>"));
    assert!(!out.html.contains("fc-quote-link"));
}

#[test]
fn nested_quotes_are_stripped() {
    let out = transform("[quote][quote]X[/quote]Y[/quote]", &RenderContext::new());
    assert_eq!(
        out.html,
        "<blockquote class=\"fc-quote\"><div class=\"fc-quote-body\">Y</div></blockquote>"
    );
    assert_eq!(out.quotes.len(), 1);
    assert_eq!(out.quotes[0].body, "Y");
    assert!(out.diagnostics.iter().any(|d| d.code == W_QUOTE_NESTED));
}

#[test]
fn deeply_nested_quotes_are_stripped_with_their_break() {
    let out = transform(
        "[quote=a]top\n[quote=b]mid[quote=c]deep[/quote][/quote]\nend[/quote]",
        &RenderContext::new(),
    );
    assert_eq!(
        out.html,
        "<blockquote class=\"fc-quote\"><div class=\"fc-quote-header\"><span class=\"fc-quote-author\">a</span></div>\
         <div class=\"fc-quote-body\">top<br />end</div></blockquote>"
    );
}

#[test]
fn invalid_post_ids_are_dropped() {
    let out = transform("[quote post_id=\"a b\"]x[/quote]", &RenderContext::new());
    assert!(!out.html.contains("fc-quote-link"));
    assert!(out.diagnostics.iter().any(|d| d.code == W_QUOTE_REF_INVALID));
}

#[test]
fn numbered_ref_with_location_uses_number_anchor() {
    let context = RenderContext::new().with_location(TopicLocation::new("crap", "snagov"));
    let target = resolve_permalink(&PostRef::Number(7), &context);
    assert_eq!(
        target,
        PermalinkTarget {
            path: "/forum/crap/snagov".to_string(),
            anchor: Some("post7".to_string()),
        }
    );
    assert_eq!(target.href(), "/forum/crap/snagov#post7");
}

#[test]
fn opaque_ref_uses_mapped_number() {
    let numbers: PostNumberMap = [("a1b2c3", 4)].into_iter().collect();
    let context = RenderContext::new()
        .with_location(TopicLocation::new("crap", "snagov"))
        .with_post_numbers(numbers);
    let out = transform("[quote post_id=\"a1b2c3\"]x[/quote]", &context);
    assert!(out.html.contains("href=\"/forum/crap/snagov#post4\""));
}

#[test]
fn opaque_ref_without_number_uses_id_anchor() {
    let context = RenderContext::new().with_location(TopicLocation::new("crap", "snagov"));
    let target = resolve_permalink(&PostRef::Opaque("a1b2c3".to_string()), &context);
    assert_eq!(target.href(), "/forum/crap/snagov#post-a1b2c3");
}

#[test]
fn without_location_links_to_post_route() {
    let numbers: PostNumberMap = [("a1b2c3", 4)].into_iter().collect();
    let context = RenderContext::new().with_post_numbers(numbers);
    let target = resolve_permalink(&PostRef::Opaque("a1b2c3".to_string()), &context);
    assert_eq!(target.href(), "/forum/post/a1b2c3");
    assert_eq!(target.anchor, None);

    let out = transform("[quote post_id=\"9\"]x[/quote]", &RenderContext::new());
    assert!(out.html.contains("href=\"/forum/post/9\""));
}

#[test]
fn location_segments_are_encoded() {
    let context = RenderContext::new().with_location(TopicLocation::new("crap mare", "ce?"));
    let target = resolve_permalink(&PostRef::Number(1), &context);
    assert_eq!(target.href(), "/forum/crap%20mare/ce%3F#post1");
}

#[test]
fn decimal_id_that_is_also_mapped_is_flagged() {
    let numbers: PostNumberMap = [("15", 3)].into_iter().collect();
    let context = RenderContext::new()
        .with_location(TopicLocation::new("crap", "snagov"))
        .with_post_numbers(numbers);
    let out = transform("[quote post_id=\"15\"]x[/quote]", &context);
    assert!(out.html.contains("href=\"/forum/crap/snagov#post15\""));
    assert!(out.diagnostics.iter().any(|d| d.code == W_POST_REF_AMBIGUOUS));
}

#[test]
fn quotes_inside_lists_are_resolved() {
    let context = RenderContext::new().with_location(TopicLocation::new("crap", "snagov"));
    let out = transform("[list][*][quote post_id=\"2\"]x[/quote][/list]", &context);
    assert!(out.html.contains("href=\"/forum/crap/snagov#post2\""));
    assert_eq!(out.quotes.len(), 1);
}
