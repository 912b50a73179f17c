//! Alert message rendering for the notification channel.

use crate::domain::{AlertEvent, PositionValue, TrackedPosition};

/// Render one alert into the text delivered to the owner's channel.
///
/// `current` is the valuation the alert was decided against; it is absent
/// only for range alerts on positions that could not be resolved on-chain.
pub fn render(
    position: &TrackedPosition,
    current: Option<&PositionValue>,
    alert: &AlertEvent,
) -> String {
    match alert {
        AlertEvent::RangeExit {
            active_bin,
            lower_bin_id,
            upper_bin_id,
        } => format!(
            "⚠️ Position out of range\n\n\
             • Market: {}\n\
             • Position Mint: {}\n\
             • Active Bin: {}\n\
             • Range: {} - {}",
            position.market, position.mint, active_bin, lower_bin_id, upper_bin_id
        ),

        AlertEvent::ValueChange {
            previous_usd,
            current_usd,
            change_pct,
        } => {
            let (emoji, direction) = if *change_pct > 0.0 {
                ("📈", "increased")
            } else {
                ("📉", "decreased")
            };
            let mut text = format!(
                "{} Position Value Alert!\n\n\
                 Your position has {} by {:.2}%\n\n\
                 • Position: {}\n\
                 • Previous Value: ${:.2}\n\
                 • Current Value: ${:.2}",
                emoji,
                direction,
                change_pct.abs(),
                position.mint,
                previous_usd,
                current_usd
            );
            if let Some(value) = current {
                text.push_str(&format!(
                    "\n• Token X: {:.4} @ ${:.4}\n• Token Y: {:.4} @ ${:.4}",
                    value.token_x_amount,
                    value.token_x_price_usd,
                    value.token_y_amount,
                    value.token_y_price_usd
                ));
            }
            text
        }

        AlertEvent::IlWarning {
            il_pct,
            current_usd,
            hodl_usd,
        } => {
            let emoji = if *il_pct < -10.0 { "🔴" } else { "⚠️" };
            let mut text = format!(
                "{} **Impermanent Loss Alert!**\n\n\
                 Your position has an IL of **{:.2}%** compared to holding.\n\n\
                 📊 **Position Details:**\n\
                 • Position: {}\n\
                 • Current Value: ${:.2}\n\
                 • HODL Value: ${:.2}\n\
                 • Difference: ${:.2}",
                emoji,
                il_pct.abs(),
                position.mint,
                current_usd,
                hodl_usd,
                current_usd - hodl_usd
            );
            if let Some(value) = current {
                text.push_str(&format!(
                    "\n\n💰 **Current Position:**\n\
                     • Token X: {:.4} @ ${:.4}\n\
                     • Token Y: {:.4} @ ${:.4}",
                    value.token_x_amount,
                    value.token_x_price_usd,
                    value.token_y_amount,
                    value.token_y_price_usd
                ));
            }
            text.push_str(&format!(
                "\n\n🔒 **Initial (HODL):**\n\
                 • Token X: {:.4} @ ${:.4}\n\
                 • Token Y: {:.4} @ ${:.4}",
                position.initial_token_a_amount,
                position.initial_token_a_price_usd,
                position.initial_token_b_amount,
                position.initial_token_b_price_usd
            ));
            text
        }

        AlertEvent::IlRecovered {
            il_pct,
            current_usd,
            hodl_usd,
        } => format!(
            "✅ **Good News!**\n\n\
             Your position IL has recovered!\n\n\
             • Current Value: ${:.2}\n\
             • HODL Value: ${:.2}\n\
             • You're ahead by: {:.2}%",
            current_usd, hodl_usd, il_pct
        ),
    }
}
