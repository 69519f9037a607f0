pub mod callback_dispatcher;
