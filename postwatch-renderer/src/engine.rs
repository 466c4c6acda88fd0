//! Tera rendering: [`TemplateKind`], [`TemplateEngine`] and [`Composer`].
//!
//! # Built-in layouts
//!
//! | Template        | Output                                                   |
//! |-----------------|----------------------------------------------------------|
//! | `desktop_title` | topic name                                               |
//! | `desktop_body`  | post URL, newline, message                               |
//! | `remote_body`   | post URL, newline, `matches: a,b`, newline, `@me` if set |

use tera::Tera;

use postwatch_core::{
    config::TemplateSettings, Event, NotificationPayload, RuleSet, SelfIdentity, SinkTarget,
};

use crate::context::NotificationContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

const DESKTOP_TITLE: &str = "{{ topic_name }}";

const DESKTOP_BODY: &str = "{% if not hide_post_url %}{{ post_url }}\n{% endif %}{{ message }}";

const REMOTE_BODY: &str = "{{ post_url }}\nmatches: {{ matches | join(sep=\",\") }}\n\
{% if with_mention %}@{{ self_name }}{% endif %}";

// ---------------------------------------------------------------------------
// TemplateKind
// ---------------------------------------------------------------------------

/// Every template the composer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    DesktopTitle,
    DesktopBody,
    RemoteBody,
}

impl TemplateKind {
    /// All kinds in a stable order.
    pub fn all() -> &'static [TemplateKind] {
        &[
            TemplateKind::DesktopTitle,
            TemplateKind::DesktopBody,
            TemplateKind::RemoteBody,
        ]
    }

    /// Name registered with tera (no file extension, so autoescape stays off).
    pub fn name(&self) -> &'static str {
        match self {
            TemplateKind::DesktopTitle => "desktop_title",
            TemplateKind::DesktopBody  => "desktop_body",
            TemplateKind::RemoteBody   => "remote_body",
        }
    }

    pub fn builtin(&self) -> &'static str {
        match self {
            TemplateKind::DesktopTitle => DESKTOP_TITLE,
            TemplateKind::DesktopBody  => DESKTOP_BODY,
            TemplateKind::RemoteBody   => REMOTE_BODY,
        }
    }

    fn override_in<'a>(&self, settings: &'a TemplateSettings) -> Option<&'a str> {
        match self {
            TemplateKind::DesktopTitle => settings.desktop_title.as_deref(),
            TemplateKind::DesktopBody  => settings.desktop_body.as_deref(),
            TemplateKind::RemoteBody   => settings.remote_body.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine holding the built-in templates plus configured overrides.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Compile every template, taking overrides from `settings` where present.
    pub fn new(settings: &TemplateSettings) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        for kind in TemplateKind::all() {
            let source = kind.override_in(settings).unwrap_or(kind.builtin());
            tera.add_raw_template(kind.name(), source)
                .map_err(|source| RenderError::Template { name: kind.name(), source })?;
        }
        Ok(TemplateEngine { tera })
    }

    /// Render one template with a prepared context.
    pub fn render(&self, kind: TemplateKind, ctx: &tera::Context) -> Result<String, RenderError> {
        self.tera
            .render(kind.name(), ctx)
            .map_err(|source| RenderError::Template { name: kind.name(), source })
    }
}

// ---------------------------------------------------------------------------
// Composer
// ---------------------------------------------------------------------------

/// Turns an accepted event into desktop and repost payloads.
///
/// Create once at startup with [`Composer::new`] and reuse; composing never
/// mutates the composer.
pub struct Composer {
    engine: TemplateEngine,
}

impl Composer {
    /// Compile templates and render each against a probe event, so a template
    /// that only fails at render time (unknown variable, bad filter argument)
    /// is reported at startup.
    pub fn new(settings: &TemplateSettings) -> Result<Self, RenderError> {
        let composer = Composer { engine: TemplateEngine::new(settings)? };
        composer.probe()?;
        Ok(composer)
    }

    /// Built-in templates only.
    pub fn builtin() -> Result<Self, RenderError> {
        Self::new(&TemplateSettings::default())
    }

    /// Payloads for an event the classifier accepted with `matched` keywords.
    ///
    /// Emits a desktop payload when desktop notifications are enabled and a
    /// repost payload when reposting targets a topic; zero, one or two entries.
    /// Fails if any payload fails to render.
    pub fn compose(
        &self,
        event: &Event,
        matched: &[String],
        rules: &RuleSet,
        me: &SelfIdentity,
    ) -> Result<Vec<NotificationPayload>, RenderError> {
        self.compose_each(event, matched, rules, me).into_iter().collect()
    }

    /// Like [`Composer::compose`], but renders each payload independently so
    /// one failing template does not suppress the other payload.
    pub fn compose_each(
        &self,
        event: &Event,
        matched: &[String],
        rules: &RuleSet,
        me: &SelfIdentity,
    ) -> Vec<Result<NotificationPayload, RenderError>> {
        let ctx = NotificationContext::build(event, matched, rules, me);
        let tera_ctx = match ctx.to_tera_context() {
            Ok(tera_ctx) => tera_ctx,
            Err(err) => return vec![Err(err)],
        };

        let mut payloads = Vec::with_capacity(2);
        if rules.desktop_enabled {
            payloads.push(self.desktop_payload(&tera_ctx));
        }
        if rules.reposts_enabled() {
            payloads.push(
                self.engine
                    .render(TemplateKind::RemoteBody, &tera_ctx)
                    .map(|body| NotificationPayload {
                        sink: SinkTarget::Remote { topic_id: rules.remote_target_topic_id },
                        title: ctx.topic_name.clone(),
                        body,
                    }),
            );
        }
        payloads
    }

    fn desktop_payload(&self, ctx: &tera::Context) -> Result<NotificationPayload, RenderError> {
        Ok(NotificationPayload {
            sink: SinkTarget::Desktop,
            title: self.engine.render(TemplateKind::DesktopTitle, ctx)?,
            body: self.engine.render(TemplateKind::DesktopBody, ctx)?,
        })
    }

    fn probe(&self) -> Result<(), RenderError> {
        let ctx = NotificationContext::build(
            &Event::default(),
            &["probe".to_string()],
            &RuleSet::default(),
            &SelfIdentity::new("probe"),
        );
        let tera_ctx = ctx.to_tera_context()?;
        for kind in TemplateKind::all() {
            self.engine.render(*kind, &tera_ctx)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
