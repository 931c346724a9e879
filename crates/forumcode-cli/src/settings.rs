use std::path::Path;

use config::{Config, Environment, File};
use forumcode_core::{PostNumberMap, RenderContext, RenderOptions, TopicLocation};

use crate::args::RenderArgs;
use crate::error::CliError;

/// Builds render options from the config file and `FORUMCODE_*` variables.
pub fn load_options(config_file: Option<&Path>) -> Result<RenderOptions, CliError> {
    let mut builder = Config::builder();
    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }
    builder = builder.add_source(
        Environment::with_prefix("FORUMCODE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let options: RenderOptions = builder.build()?.try_deserialize()?;
    Ok(options)
}

/// Command line flags win over every other source.
pub fn render_context(mut options: RenderOptions, args: &RenderArgs) -> RenderContext {
    if let Some(forum_base) = &args.forum_base {
        options.forum_base = forum_base.trim_end_matches('/').to_string();
    }
    if let Some(profile_route) = &args.profile_route {
        options.profile_route = profile_route.trim_end_matches('/').to_string();
    }
    if args.same_tab {
        options.open_links_in_new_tab = false;
    }

    let mut context = RenderContext::new().with_options(options);
    if let (Some(subcategory), Some(topic)) = (&args.location.subcategory, &args.location.topic) {
        let mut location = TopicLocation::new(subcategory.as_str(), topic.as_str());
        if let Some(category) = &args.location.category {
            location = location.with_category(category.as_str());
        }
        context = context.with_location(location);
    }
    if !args.post_numbers.is_empty() {
        let mut numbers = PostNumberMap::new();
        for (id, number) in &args.post_numbers {
            numbers.insert(id.as_str(), *number);
        }
        context = context.with_post_numbers(numbers);
    }
    context
}
