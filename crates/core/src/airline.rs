//! Mock Airline Operations
//!
//! Deterministic stand-ins for a reservation backend: customer lookup,
//! identity checks, and ticket operations. Nothing here talks to a real
//! system; every tool answers from canned data so agents can be exercised
//! end to end.

use crate::tools::{Tool, ToolRegistry, ToolSpec};
use chrono::{Duration, Local};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

// --- Customer Data ---

#[derive(Debug, Clone, Serialize)]
pub struct Flight {
    pub flight_number: String,
    pub ticket_number: String,
    pub origin: String,
    pub destination: String,
    pub date: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub status: String,
    #[serde(rename = "class")]
    pub cabin_class: String,
    pub seat: String,
    pub baggage_allowance: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub name: String,
    pub phone_number: String,
    pub identity_number: String,
    pub passport: String,
    pub flights: Vec<Flight>,
}

impl Customer {
    /// True when `digits` equals the last five characters of the national id
    /// or of the passport number.
    pub fn matches_id_suffix(&self, digits: &str) -> bool {
        let digits = digits.trim();
        [&self.identity_number, &self.passport]
            .into_iter()
            .filter_map(|s| last_n(s, 5))
            .any(|suffix| suffix == digits)
    }
}

fn last_n(s: &str, n: usize) -> Option<&str> {
    if s.is_empty() {
        return None;
    }
    let start = s.char_indices().rev().nth(n - 1).map_or(0, |(i, _)| i);
    Some(&s[start..])
}

fn days_from_today(days: i64) -> String {
    (Local::now() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

#[allow(clippy::too_many_arguments)]
fn flight(
    flight_number: &str,
    ticket_number: &str,
    origin: &str,
    destination: &str,
    days_ahead: i64,
    departure_time: &str,
    arrival_time: &str,
    cabin_class: &str,
    seat: &str,
    baggage_allowance: &str,
) -> Flight {
    Flight {
        flight_number: flight_number.into(),
        ticket_number: ticket_number.into(),
        origin: origin.into(),
        destination: destination.into(),
        date: days_from_today(days_ahead),
        departure_time: departure_time.into(),
        arrival_time: arrival_time.into(),
        status: "confirmed".into(),
        cabin_class: cabin_class.into(),
        seat: seat.into(),
        baggage_allowance: baggage_allowance.into(),
    }
}

/// The canned customer book. Flight dates are relative to today.
pub fn customers() -> Vec<Customer> {
    vec![
        Customer {
            name: "Ugur Akın Eren".into(),
            phone_number: "05551234567".into(),
            identity_number: "12345678912".into(),
            passport: "P1234567".into(),
            flights: vec![
                flight("TK1984", "235-1234567890", "IST", "JFK", 5, "14:30", "18:45", "economy", "23A", "30kg"),
                flight("TK2023", "235-9876543210", "JFK", "IST", 15, "20:15", "14:30", "economy", "18C", "30kg"),
            ],
        },
        Customer {
            name: "Gizem Kaya".into(),
            phone_number: "05559876543".into(),
            identity_number: "98765432109".into(),
            passport: "P7654321".into(),
            flights: vec![flight(
                "TK2468", "235-2468101214", "IST", "LHR", 3, "09:45", "11:55", "business", "4A", "40kg",
            )],
        },
    ]
}

pub fn customer_by_phone(phone_number: &str) -> Option<Customer> {
    customers()
        .into_iter()
        .find(|c| c.phone_number == phone_number)
}

fn customer_not_found() -> Value {
    json!({
        "status": "not_found",
        "message": "Customer not found with this phone number."
    })
}

// --- Tool Arguments ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PhoneArgs {
    /// Customer's phone number, e.g. "05551234567".
    pub phone_number: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct VerifyIdArgs {
    /// Customer's phone number.
    pub phone_number: String,
    /// Last five digits of the national ID or passport number.
    pub id_last_5_digits: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TicketArgs {
    /// The ticket number, e.g. "235-1234567890".
    pub ticket_number: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChangeFlightArgs {
    /// The ticket number to change.
    pub ticket_number: String,
    /// Requested new departure time.
    pub new_time: String,
    /// Origin airport code.
    pub origin: String,
    /// Destination airport code.
    pub destination: String,
    /// Travel date (YYYY-MM-DD).
    pub date: String,
    /// Whether to show only direct flights.
    #[serde(default)]
    pub direct_only: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FeeArgs {
    /// The ticket number.
    pub ticket_number: String,
    /// Operation to price: 'change', 'cancel', 'upgrade', or another label.
    pub operation: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RouteArgs {
    /// Origin airport code.
    pub origin: String,
    /// Destination airport code.
    pub destination: String,
    /// Travel date (YYYY-MM-DD).
    pub date: String,
}

// --- Tools ---

pub fn get_customer_info(args: PhoneArgs) -> Value {
    debug!(phone_number = %args.phone_number, "Looking up customer");
    let Some(customer) = customer_by_phone(&args.phone_number) else {
        return customer_not_found();
    };
    json!({
        "status": "found",
        "message": format!("Customer {} found.", customer.name),
        "phone_number": customer.phone_number,
        "identity_number": customer.identity_number,
        "passport": customer.passport,
        "flight_count": customer.flights.len(),
        "flights": customer.flights,
    })
}

pub fn verify_id(args: VerifyIdArgs) -> Value {
    let Some(customer) = customer_by_phone(&args.phone_number) else {
        return customer_not_found();
    };
    let is_valid = customer.matches_id_suffix(&args.id_last_5_digits);
    json!({
        "status": if is_valid { "verified" } else { "invalid" },
        "name": customer.name,
        "message": if is_valid { "ID verification successful." } else { "Invalid ID or passport number." },
    })
}

pub fn get_customer_flights(args: PhoneArgs) -> Value {
    let Some(customer) = customer_by_phone(&args.phone_number) else {
        return customer_not_found();
    };
    json!({
        "status": "success",
        "name": customer.name,
        "flight_count": customer.flights.len(),
        "message": format!("Found {} flights for {}.", customer.flights.len(), customer.name),
        "flights": customer.flights,
    })
}

const BASE_FARE: i64 = 1200;

pub fn change_flight(args: ChangeFlightArgs) -> Value {
    let ChangeFlightArgs {
        ticket_number,
        new_time,
        origin,
        destination,
        date,
        direct_only,
    } = args;

    let mut alternatives = Vec::new();
    if !direct_only {
        alternatives.push(json!({
            "flight_number": "TK234",
            "segments": [{"from": origin, "to": destination}],
            "departure": format!("{date} 16:00"),
            "arrival": format!("{date} 18:30"),
            "stops": 0,
            "total_travel_time": "2h 30m",
            "price_difference": 350,
            "estimated_total_price": BASE_FARE + 350,
            "seats_available": 5,
            "meal_service": "Included",
            "direct": true,
            "message": "Direct flight available."
        }));
    }
    alternatives.push(json!({
        "flight_number": "TK567",
        "segments": [
            {"from": origin, "to": "FRA", "departure": format!("{date} 09:00"), "arrival": format!("{date} 11:00")},
            {"from": "FRA", "to": destination, "departure": format!("{date} 14:00"), "arrival": format!("{date} 18:30")},
        ],
        "departure": format!("{date} 09:00"),
        "arrival": format!("{date} 18:30"),
        "stops": 1,
        "transfer_airports": ["FRA"],
        "layover_times": ["3h"],
        "total_travel_time": "9h 30m",
        "price_difference": 250,
        "estimated_total_price": BASE_FARE + 250,
        "seats_available": 2,
        "meal_service": "Included",
        "direct": false,
        "message": "Transfer at Frankfurt (FRA). Reasonable layover for connection."
    }));
    alternatives.push(json!({
        "flight_number": "TK890",
        "segments": [
            {"from": origin, "to": "LHR", "departure": format!("{date} 12:00"), "arrival": format!("{date} 14:00")},
            {"from": "LHR", "to": destination, "departure": format!("{date} 16:00"), "arrival": format!("{date} 20:30")},
        ],
        "departure": format!("{date} 12:00"),
        "arrival": format!("{date} 20:30"),
        "stops": 1,
        "transfer_airports": ["LHR"],
        "layover_times": ["2h"],
        "total_travel_time": "8h 30m",
        "price_difference": 150,
        "estimated_total_price": BASE_FARE + 150,
        "seats_available": 8,
        "meal_service": "Not included",
        "direct": false,
        "message": "Transfer at London Heathrow (LHR). Shorter total travel time but later arrival."
    }));

    let no_direct = alternatives
        .iter()
        .all(|a| a["direct"] == Value::Bool(false));
    if direct_only && no_direct {
        return json!({
            "ticket_number": ticket_number,
            "status": "No direct flights available",
            "origin": origin,
            "destination": destination,
            "date": date,
            "alternatives": alternatives,
            "info": "No direct flights were found for the requested time. Showing connecting options instead."
        });
    }

    json!({
        "ticket_number": ticket_number,
        "status": "Flight change options",
        "requested_new_time": new_time,
        "origin": origin,
        "destination": destination,
        "date": date,
        "alternatives": alternatives,
        "info": "Below are your alternative flights including transfer airports, layover times, seat availability and estimated total price."
    })
}

pub fn cancel_flight(args: TicketArgs) -> Value {
    let (fee, refund) = (500, 1200);
    json!({
        "ticket_number": args.ticket_number,
        "status": "Cancelled",
        "cancellation_fee": fee,
        "refund_amount": refund,
        "message": format!("Your flight has been cancelled. Cancellation fee: {fee} USD. Refund amount: {refund} USD."),
    })
}

pub fn open_ticket(args: TicketArgs) -> Value {
    let (fee, validity) = (200, "1 year");
    json!({
        "ticket_number": args.ticket_number,
        "status": "Open",
        "open_ticket_fee": fee,
        "validity_period": validity,
        "message": format!("Your ticket is now open. Fee: {fee} USD. Valid for {validity}."),
    })
}

pub fn calculate_fee(args: FeeArgs) -> Value {
    let (base_fee, taxes, service_charge) = (1000, 120, 50);
    let fee = match args.operation.as_str() {
        "change" => base_fee + 350 + taxes + service_charge,
        "cancel" => base_fee - 500 + taxes,
        "upgrade" => base_fee + 800 + taxes + service_charge,
        _ => base_fee + taxes,
    };
    json!({
        "ticket_number": args.ticket_number,
        "operation": args.operation,
        "calculated_fee": fee,
        "breakdown": {
            "base_fee": base_fee,
            "taxes": taxes,
            "service_charge": service_charge
        },
        "message": format!("Calculated fee for {}: {fee} USD.", args.operation),
    })
}

pub fn transfer_support(args: TicketArgs) -> Value {
    json!({
        "ticket_number": args.ticket_number,
        "status": "Transfer Info",
        "segments": [
            {"from": "IST", "to": "FRA", "departure": "2025-09-14 09:00"},
            {"from": "FRA", "to": "JFK", "departure": "2025-09-14 13:00"},
        ],
        "total_travel_time": "14h 30m",
        "layover_time": "4h",
        "transfer_airport": "Frankfurt (FRA)",
        "message": "Your connecting flights and transfer details are provided."
    })
}

pub fn suggest_alternatives(args: RouteArgs) -> Value {
    let date = &args.date;
    json!({
        "origin": args.origin,
        "destination": args.destination,
        "date": date,
        "alternatives": [
            {
                "flight_number": "TK234",
                "departure": format!("{date} 16:00"),
                "arrival": format!("{date} 18:30"),
                "price": 1200,
                "direct": true,
                "seats_available": 5,
                "meal_service": "Included"
            },
            {
                "flight_number": "TK567",
                "departure": format!("{date} 19:00"),
                "arrival": format!("{date} 22:30"),
                "price": 1100,
                "direct": false,
                "transfer": "FRA",
                "seats_available": 2,
                "meal_service": "Included"
            },
            {
                "flight_number": "TK890",
                "departure": format!("{date} 21:00"),
                "arrival": format!("{date} 01:30"),
                "price": 950,
                "direct": false,
                "transfer": "LHR",
                "seats_available": 8,
                "meal_service": "Not included"
            }
        ],
        "message": "Here are alternative flight options with seat availability and meal service details."
    })
}

pub fn baggage_info(args: TicketArgs) -> Value {
    let (allowance, excess_fee) = ("30kg checked, 8kg cabin", 25);
    json!({
        "ticket_number": args.ticket_number,
        "baggage_allowance": allowance,
        "excess_fee_per_kg": excess_fee,
        "message": format!("Baggage allowance: {allowance}. Excess baggage fee: {excess_fee} USD per kg."),
    })
}

pub fn upgrade_request(args: TicketArgs) -> Value {
    let (fee, classes) = (800, ["Business", "First"]);
    json!({
        "ticket_number": args.ticket_number,
        "upgrade_fee": fee,
        "available_classes": classes,
        "message": format!("Upgrade available to {}. Fee: {fee} USD.", classes.join(", ")),
    })
}

pub fn special_assistance(args: TicketArgs) -> Value {
    json!({
        "ticket_number": args.ticket_number,
        "assistance_types": ["Wheelchair", "Special meal", "Unaccompanied minor"],
        "contact_number": "+1-800-555-1234",
        "message": "Special assistance options are available. Please contact support for arrangements."
    })
}

/// Registers every airline tool on `registry`.
pub fn register_airline_tools(registry: &mut ToolRegistry) {
    registry
        .register(
            ToolSpec::for_args::<PhoneArgs>(
                "get_customer_info_tool",
                "Retrieve customer data based on phone number.",
            ),
            Tool::typed(get_customer_info),
        )
        .register(
            ToolSpec::for_args::<VerifyIdArgs>(
                "verify_id_tool",
                "Verify customer identity using phone number and last 5 digits of ID/passport.",
            ),
            Tool::typed(verify_id),
        )
        .register(
            ToolSpec::for_args::<PhoneArgs>(
                "get_customer_flights_tool",
                "Get the list of flights for a customer by phone number.",
            ),
            Tool::typed(get_customer_flights),
        )
        .register(
            ToolSpec::for_args::<ChangeFlightArgs>(
                "change_flight_tool",
                "Change flight and get alternative options.",
            ),
            Tool::typed(change_flight),
        )
        .register(
            ToolSpec::for_args::<TicketArgs>(
                "cancel_flight_tool",
                "Cancel a flight and calculate fees/refunds.",
            ),
            Tool::typed(cancel_flight),
        )
        .register(
            ToolSpec::for_args::<TicketArgs>("open_ticket_tool", "Convert ticket to open ticket."),
            Tool::typed(open_ticket),
        )
        .register(
            ToolSpec::for_args::<FeeArgs>(
                "calculate_fee_tool",
                "Calculate fees for various operations.",
            ),
            Tool::typed(calculate_fee),
        )
        .register(
            ToolSpec::for_args::<TicketArgs>(
                "transfer_support_tool",
                "Get transfer and connection information.",
            ),
            Tool::typed(transfer_support),
        )
        .register(
            ToolSpec::for_args::<RouteArgs>(
                "suggest_alternatives_tool",
                "Suggest alternative flights for a route and date.",
            ),
            Tool::typed(suggest_alternatives),
        )
        .register(
            ToolSpec::for_args::<TicketArgs>(
                "baggage_info_tool",
                "Get baggage allowance and fee information.",
            ),
            Tool::typed(baggage_info),
        )
        .register(
            ToolSpec::for_args::<TicketArgs>(
                "upgrade_request_tool",
                "Request seat or class upgrade.",
            ),
            Tool::typed(upgrade_request),
        )
        .register(
            ToolSpec::for_args::<TicketArgs>(
                "special_assistance_tool",
                "Request special assistance services.",
            ),
            Tool::typed(special_assistance),
        );
}
