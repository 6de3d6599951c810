//! Browser-side override of the global `Date`
//!
//! This is the only place that knows how the page's clock is replaced. The
//! generated program:
//!
//! - remembers the page's original `Date` the first time it runs, and always
//!   extends that original, so installing twice never stacks offsets;
//! - makes `new Date()` with no arguments start at the mocked instant while
//!   explicit arguments behave exactly as before;
//! - makes `Date.now()` return the mocked instant plus the real time elapsed
//!   since the patch ran, so time keeps flowing;
//! - makes `Date()` called without `new` return the mocked instant as a
//!   string, like the native function.
//!
//! Replacing the global constructor changes its identity, so frameworks that
//! compare server and client renders may log hydration warnings. That is an
//! accepted cost in tests.

use regex::Regex;
use std::sync::LazyLock;

use super::logical_date::LogicalDate;

const ORIGINAL_DATE_SLOT: &str = "__dualClockOriginalDate";

static MOCKED_EPOCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"const mockedEpoch = (-?\d+);").expect("mocked epoch pattern is valid")
});

/// A self-contained script that pins the page's clock to one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchScript {
    epoch_millis: i64,
    source: String,
}

impl PatchScript {
    pub fn for_date(date: &LogicalDate) -> Self {
        let epoch_millis = date.epoch_millis();
        let source = format!(
            r#"(() => {{
  const OriginalDate = globalThis.{slot} || globalThis.Date;
  globalThis.{slot} = OriginalDate;
  const mockedEpoch = {epoch_millis};
  const installedAt = OriginalDate.now();
  const mockedNow = () => mockedEpoch + (OriginalDate.now() - installedAt);
  function MockedDate(...args) {{
    if (!new.target) {{
      return new OriginalDate(mockedNow()).toString();
    }}
    return Reflect.construct(OriginalDate, args.length ? args : [mockedNow()], new.target);
  }}
  Object.setPrototypeOf(MockedDate, OriginalDate);
  MockedDate.prototype = OriginalDate.prototype;
  MockedDate.now = mockedNow;
  globalThis.Date = MockedDate;
}})();
"#,
            slot = ORIGINAL_DATE_SLOT,
        );

        Self {
            epoch_millis,
            source,
        }
    }

    /// The mocked instant this script closes over
    pub fn epoch_millis(&self) -> i64 {
        self.epoch_millis
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Recover the mocked instant from a script produced by [`for_date`].
    ///
    /// Returns `None` for any other script.
    ///
    /// [`for_date`]: PatchScript::for_date
    pub fn parse_epoch(source: &str) -> Option<i64> {
        MOCKED_EPOCH
            .captures(source)
            .and_then(|captures| captures.get(1))
            .and_then(|literal| literal.as_str().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_for(text: &str) -> PatchScript {
        PatchScript::for_date(&LogicalDate::parse(text).unwrap())
    }

    #[test]
    fn test_script_embeds_exactly_one_numeric_literal() {
        let script = script_for("2030-01-01T00:00:00Z");
        let literals: Vec<&str> = Regex::new(r"\b\d+\b")
            .unwrap()
            .find_iter(script.source())
            .map(|m| m.as_str())
            .collect();

        assert_eq!(literals, vec!["1893456000000"]);
    }

    #[test]
    fn test_parse_epoch_recovers_literal() {
        let script = script_for("1999-12-31T23:59:59.500Z");
        assert_eq!(
            PatchScript::parse_epoch(script.source()),
            Some(script.epoch_millis())
        );
    }

    #[test]
    fn test_parse_epoch_handles_pre_epoch_dates() {
        let script = script_for("1969-07-20T20:17:40Z");
        assert!(script.epoch_millis() < 0);
        assert_eq!(
            PatchScript::parse_epoch(script.source()),
            Some(script.epoch_millis())
        );
    }

    #[test]
    fn test_parse_epoch_ignores_unrelated_scripts() {
        assert_eq!(PatchScript::parse_epoch("return document.title;"), None);
    }

    #[test]
    fn test_regenerating_is_idempotent() {
        assert_eq!(
            script_for("2030-01-01T00:00:00Z"),
            script_for("2030-01-01T00:00:00Z")
        );
    }

    mod in_a_js_engine {
        use super::*;
        use boa_engine::{Context, JsValue, Source};

        const MILLENNIUM_EVE_MS: f64 = 946_598_400_000.0;

        fn run(context: &mut Context, code: &str) -> JsValue {
            context.eval(Source::from_bytes(code)).unwrap()
        }

        fn number(context: &mut Context, code: &str) -> f64 {
            run(context, code).as_number().unwrap()
        }

        fn boolean(context: &mut Context, code: &str) -> bool {
            run(context, code).as_boolean().unwrap()
        }

        fn install(context: &mut Context, script: &PatchScript) {
            run(context, script.source());
        }

        fn assert_near(actual: f64, expected: i64) {
            let drift = actual - expected as f64;
            assert!((0.0..5_000.0).contains(&drift), "drifted {drift}ms");
        }

        #[test]
        fn test_now_and_bare_construction_start_at_the_mocked_instant() {
            let mut context = Context::default();
            let script = script_for("2030-01-01T00:00:00Z");
            install(&mut context, &script);

            assert_near(number(&mut context, "Date.now()"), script.epoch_millis());
            assert_near(
                number(&mut context, "new Date().getTime()"),
                script.epoch_millis(),
            );
            assert!(boolean(&mut context, "new Date() instanceof Date"));
        }

        #[test]
        fn test_explicit_arguments_are_not_overridden() {
            let mut context = Context::default();
            install(&mut context, &script_for("2030-01-01T00:00:00Z"));

            assert_eq!(
                number(&mut context, "new Date('1999-12-31').getTime()"),
                MILLENNIUM_EVE_MS
            );
            assert_eq!(
                number(&mut context, "new Date(1999, 11, 31).getFullYear()"),
                1999.0
            );
            assert_eq!(
                number(&mut context, "Date.UTC(1999, 11, 31)"),
                MILLENNIUM_EVE_MS
            );
        }

        #[test]
        fn test_calling_without_new_returns_a_string() {
            let mut context = Context::default();
            install(&mut context, &script_for("2030-01-01T00:00:00Z"));

            assert!(boolean(&mut context, "typeof Date() === 'string'"));
            assert!(boolean(
                &mut context,
                "Date().includes('2030') || Date().includes('2029')"
            ));
        }

        #[test]
        fn test_installing_twice_does_not_stack() {
            let mut context = Context::default();
            let script = script_for("2030-01-01T00:00:00Z");
            install(&mut context, &script);
            install(&mut context, &script);

            assert_near(number(&mut context, "Date.now()"), script.epoch_millis());
            assert!(boolean(
                &mut context,
                "Object.getPrototypeOf(Date) === globalThis.__dualClockOriginalDate"
            ));
            let real_now = chrono::Utc::now().timestamp_millis();
            let original_now = number(&mut context, "globalThis.__dualClockOriginalDate.now()");
            assert!((original_now - real_now as f64).abs() < 60_000.0);
        }

        #[test]
        fn test_later_install_takes_over() {
            let mut context = Context::default();
            install(&mut context, &script_for("2030-01-01T00:00:00Z"));
            let later = script_for("2040-06-15T12:00:00Z");
            install(&mut context, &later);

            assert_near(number(&mut context, "Date.now()"), later.epoch_millis());
            assert_near(
                number(&mut context, "new Date().getTime()"),
                later.epoch_millis(),
            );
        }
    }
}
