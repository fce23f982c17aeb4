mod finalized_case;
mod locale_fallback_case;
mod user_precedence_case;
