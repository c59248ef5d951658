pub mod ticket_handler;

pub use ticket_handler::{
    __path_create_ticket, __path_finish_service, __path_get_catalog, __path_get_ticket,
    __path_list_tickets, __path_start_service, __path_submit_feedback, __path_update_ticket,
    create_ticket, finish_service, get_catalog, get_ticket, list_tickets, start_service,
    submit_feedback, update_ticket,
};
