use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Days,
  Local,
  NaiveDate
};
use regex::Regex;

pub const DEADLINE_FORMAT: &str =
  "%Y-%m-%d";

pub fn today() -> NaiveDate {
  Local::now().date_naive()
}

/// Parses a deadline as typed in the
/// task form: `YYYY-MM-DD`, `today`,
/// `tomorrow`, `+Nd` or `+Nw`.
pub fn parse_deadline(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "" => {
      return Err(anyhow!(
        "deadline is empty"
      ));
    }
    | "today" => return Ok(today),
    | "tomorrow" => {
      return today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "deadline out of range"
          )
        });
    }
    | _ => {}
  }

  let rel_re = Regex::new(
    r"^\+(?P<num>\d+)(?P<unit>[dw])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: u64 = caps["num"]
      .parse()
      .context(
        "invalid relative deadline"
      )?;
    let days = match &caps["unit"] {
      | "w" => num.saturating_mul(7),
      | _ => num
    };
    return today
      .checked_add_days(Days::new(days))
      .ok_or_else(|| {
        anyhow!(
          "deadline out of range: \
           {token}"
        )
      });
  }

  NaiveDate::parse_from_str(
    token,
    DEADLINE_FORMAT
  )
  .with_context(|| {
    format!(
      "invalid deadline {token:?}; \
       expected YYYY-MM-DD, today, \
       tomorrow, +Nd or +Nw"
    )
  })
}

pub fn format_deadline(
  date: NaiveDate
) -> String {
  date.format(DEADLINE_FORMAT).to_string()
}
