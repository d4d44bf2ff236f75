//! Animation suppressor strategies.
//!
//! Each strategy contributes an in-page snippet that neutralizes one family of
//! JavaScript animation entry points. Snippets run in order, each inside its
//! own `try` block, so one failing strategy never blocks the others.

/// One way of making JavaScript-driven animation resolve immediately
pub trait AnimationSuppressor: Send + Sync {
    /// Short identifier reported back when the snippet throws
    fn name(&self) -> &'static str;

    /// Statement(s) executed in-page; may throw
    fn snippet(&self) -> &'static str;
}

/// Runs `requestAnimationFrame` callbacks on the next task instead of the next frame
pub struct AnimationFrameSuppressor;

impl AnimationSuppressor for AnimationFrameSuppressor {
    fn name(&self) -> &'static str {
        "requestAnimationFrame"
    }

    fn snippet(&self) -> &'static str {
        r#"window.requestAnimationFrame = function (callback) {
            return nativeSetTimeout(function () { callback(performance.now()); }, 0);
        };"#
    }
}

/// Collapses short timer delays (under 100ms) to zero
pub struct ShortTimerSuppressor;

impl AnimationSuppressor for ShortTimerSuppressor {
    fn name(&self) -> &'static str {
        "setTimeout"
    }

    fn snippet(&self) -> &'static str {
        r#"window.setTimeout = function (callback, delay, ...args) {
            const adjusted = (delay && delay < 100) ? 0 : delay;
            return nativeSetTimeout(callback, adjusted, ...args);
        };"#
    }
}

pub struct JQuerySuppressor;

impl AnimationSuppressor for JQuerySuppressor {
    fn name(&self) -> &'static str {
        "jquery"
    }

    fn snippet(&self) -> &'static str {
        r#"const $ = window.jQuery || window.$;
        if ($ && $.fx) { $.fx.off = true; }"#
    }
}

pub struct GsapSuppressor;

impl AnimationSuppressor for GsapSuppressor {
    fn name(&self) -> &'static str {
        "gsap"
    }

    fn snippet(&self) -> &'static str {
        r#"if (window.gsap && window.gsap.globalTimeline) {
            window.gsap.globalTimeline.progress(1);
            window.gsap.globalTimeline.pause();
        }"#
    }
}

pub struct AnimeJsSuppressor;

impl AnimationSuppressor for AnimeJsSuppressor {
    fn name(&self) -> &'static str {
        "anime"
    }

    fn snippet(&self) -> &'static str {
        r#"if (window.anime && Array.isArray(window.anime.running)) {
            window.anime.running.forEach(function (a) { a.seek(a.duration); a.pause(); });
        }"#
    }
}

pub struct VelocitySuppressor;

impl AnimationSuppressor for VelocitySuppressor {
    fn name(&self) -> &'static str {
        "velocity"
    }

    fn snippet(&self) -> &'static str {
        r#"if (window.Velocity) { window.Velocity.mock = true; }"#
    }
}

/// Strategies applied when animations are disabled, in application order
pub fn default_suppressors() -> Vec<Box<dyn AnimationSuppressor>> {
    vec![
        Box::new(AnimationFrameSuppressor),
        Box::new(ShortTimerSuppressor),
        Box::new(JQuerySuppressor),
        Box::new(GsapSuppressor),
        Box::new(AnimeJsSuppressor),
        Box::new(VelocitySuppressor),
    ]
}

/// Wraps each snippet in its own guarded block, recording failures by name
pub(crate) fn render(suppressors: &[Box<dyn AnimationSuppressor>]) -> String {
    suppressors
        .iter()
        .map(|s| {
            format!(
                "try {{\n{}\n}} catch (e) {{ report.suppressorFailures.push({}); }}\n",
                s.snippet(),
                serde_json::Value::String(s.name().to_string())
            )
        })
        .collect()
}
